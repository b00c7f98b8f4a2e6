//! Reply template pools and the strategies that pick from them.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Named pool of interchangeable phrasings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    Greeting,
    LocationQuestion,
    Qualification,
    Pitch,
    Reassurance,
    ClosingCall,
    /// Follow-up in `Closing` when no offer was asked for. Never mentions a link.
    Nudge,
}

impl Pool {
    /// Every pool, in declaration order.
    pub const ALL: [Pool; 7] = [
        Pool::Greeting,
        Pool::LocationQuestion,
        Pool::Qualification,
        Pool::Pitch,
        Pool::Reassurance,
        Pool::ClosingCall,
        Pool::Nudge,
    ];
}

impl Pool {
    /// Phrasings for this pool. Never empty.
    pub fn templates(&self) -> &'static [&'static str] {
        match self {
            Self::Greeting => &[
                "Oi! Tudo bem? 😊",
                "Olá, como estás? 😉",
                "Oi oi! Tudo joia?",
                "Olá! Tudo bem por aí?",
            ],
            Self::LocationQuestion => &[
                "De que cidade falas?",
                "És de onde?",
                "Conta-me, de que cidade és?",
                "De onde estás a falar comigo?",
            ],
            Self::Qualification => &[
                "O que mais procuras por aqui?",
                "Conta-me um pouco do que gostas.",
                "O que te chamou a atenção no meu perfil?",
                "Já conheces este tipo de conteúdo exclusivo?",
                "Aposto que gostas de coisas especiais, certo?",
            ],
            Self::Pitch => &[
                "Sabias que preparo conteúdo exclusivo para pessoas como tu? 🔥",
                "Tenho um material especial que acho que vais adorar.",
                "Queres conhecer o meu conteúdo exclusivo?",
                "Trabalho com conteúdo exclusivo para clientes especiais como tu.",
            ],
            Self::Reassurance => &[
                "É só subscrever, sem complicações. Passas a ser cliente especial 😉",
                "Não há pegadinha nenhuma, podes ficar tranquilo.",
                "O pagamento é feito por uma plataforma segura, não pedes nada a ninguém.",
                "Se fosse golpe pediria muito mais, não achas?",
            ],
            Self::ClosingCall => &[
                "Então, queres ser meu cliente especial? 💋",
                "Vou mostrar-te coisas que nunca viste...",
                "O link está aqui, vamos a isso? 😘",
                "Quando quiseres, é só usar o link.",
            ],
            Self::Nudge => &[
                "Então, queres ser meu cliente especial? 💋",
                "E aí, vamos a isso? 😘",
                "Ainda estás por aí? Tenho algo especial para ti.",
                "Diz-me só se queres, e eu trato de tudo 😉",
            ],
        }
    }
}

/// Strategy for choosing one template from a pool.
///
/// Production uses [`RandomSelector`]; tests inject [`FirstSelector`] or a
/// seeded [`RandomSelector`] for reproducible output.
pub trait TemplateSelector: Send + Sync {
    /// Index into a non-empty pool of `len` items.
    fn select_index(&self, pool: Pool, len: usize) -> usize;

    /// Pick a phrasing from `pool`.
    fn pick(&self, pool: Pool) -> &'static str {
        let templates = pool.templates();
        let index = self.select_index(pool, templates.len());
        templates[index.min(templates.len() - 1)]
    }
}

/// Uniform random choice.
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    /// Entropy-seeded selector.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible selector for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateSelector for RandomSelector {
    fn select_index(&self, _pool: Pool, len: usize) -> usize {
        // A poisoned lock only means another thread panicked mid-draw; the RNG
        // state is still usable.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..len)
    }
}

/// Always the first template. Fully deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSelector;

impl TemplateSelector for FirstSelector {
    fn select_index(&self, _pool: Pool, _len: usize) -> usize {
        0
    }
}

/// Cycles through each pool in order, with one cursor per pool.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    cursors: [AtomicUsize; Pool::ALL.len()],
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateSelector for RoundRobinSelector {
    fn select_index(&self, pool: Pool, len: usize) -> usize {
        self.cursors[pool as usize].fetch_add(1, Ordering::Relaxed) % len
    }
}
