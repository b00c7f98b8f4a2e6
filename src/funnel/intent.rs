//! Intent extraction: fixed keyword sets matched as whole words.
//!
//! Pure and deterministic: the same text always yields the same [`Intent`].
//! No keyword match means a neutral intent with `interest_level == 0`.

use regex::Regex;
use tracing::debug;

use crate::funnel::types::Intent;

const GREETING_WORDS: &[&str] = &[
    "oi", "oie", "olá", "ola", "hey", "bom dia", "boa tarde", "boa noite",
];

const PRICE_WORDS: &[&str] = &[
    "preço", "preco", "valor", "valores", "quanto", "custa", "custo", "pagar", "euro", "euros",
];

const MEETING_WORDS: &[&str] = &[
    "encontrar", "encontro", "sair", "marcar", "hoje", "amanhã", "amanha",
];

const TRUST_WORDS: &[&str] = &[
    "roubar", "golpe", "taxa", "segurança", "seguranca", "confiança", "confianca", "cuidado",
    "fraude", "burla",
];

const POSITIVE_WORDS: &[&str] = &[
    "sim", "interesse", "interessado", "interessada", "quero", "gostaria", "adoraria", "claro",
    "perfeito", "top", "legal", "vamos", "bora",
];

const COMPLIMENT_WORDS: &[&str] = &[
    "linda", "lindo", "bonita", "bonito", "gatinha", "maravilhosa", "charmosa", "delícia",
    "delicia",
];

const AVAILABILITY_WORDS: &[&str] = &[
    "livre", "disponível", "disponivel", "agenda", "horário", "horario", "tempo",
];

const AGE_WORDS: &[&str] = &["idade", "anos", "velha", "nova"];

const LOCATION_QUESTION_WORDS: &[&str] = &["onde", "perto", "longe", "cidade"];

/// Closed list of recognized places.
pub const KNOWN_PLACES: &[&str] = &[
    "lisboa", "porto", "leiria", "coimbra", "braga", "aveiro", "faro",
];

/// Interest weights, applied in this order.
const WEIGHT_POSITIVE: u32 = 2;
const WEIGHT_MEETING: u32 = 3;
const WEIGHT_PRICE: u32 = 2;
const WEIGHT_COMPLIMENT: u32 = 1;
const WEIGHT_AVAILABILITY: u32 = 2;

/// A compiled whole-word alternation over a fixed word list.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    regex: Regex,
}

impl KeywordSet {
    /// Compile a whole-word matcher for `words`.
    ///
    /// Panics only if a word list produces an invalid pattern, which the
    /// escaping below rules out.
    pub fn new(words: &[&str]) -> Self {
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!(r"\b(?:{alternation})\b"))
            .expect("escaped keyword alternation is a valid regex");
        Self { regex }
    }

    /// True if any keyword occurs as a whole word in already-lowercased text.
    pub fn is_match(&self, lowered: &str) -> bool {
        self.regex.is_match(lowered)
    }

    /// Leftmost keyword occurrence.
    pub fn find<'t>(&self, lowered: &'t str) -> Option<&'t str> {
        self.regex.find(lowered).map(|m| m.as_str())
    }
}

/// Extracts [`Intent`] signals from raw message text.
#[derive(Debug, Clone)]
pub struct IntentExtractor {
    greeting: KeywordSet,
    price: KeywordSet,
    meeting: KeywordSet,
    trust: KeywordSet,
    positive: KeywordSet,
    compliment: KeywordSet,
    availability: KeywordSet,
    age: KeywordSet,
    location_question: KeywordSet,
    places: KeywordSet,
}

impl IntentExtractor {
    pub fn new() -> Self {
        Self {
            greeting: KeywordSet::new(GREETING_WORDS),
            price: KeywordSet::new(PRICE_WORDS),
            meeting: KeywordSet::new(MEETING_WORDS),
            trust: KeywordSet::new(TRUST_WORDS),
            positive: KeywordSet::new(POSITIVE_WORDS),
            compliment: KeywordSet::new(COMPLIMENT_WORDS),
            availability: KeywordSet::new(AVAILABILITY_WORDS),
            age: KeywordSet::new(AGE_WORDS),
            location_question: KeywordSet::new(LOCATION_QUESTION_WORDS),
            places: KeywordSet::new(KNOWN_PLACES),
        }
    }

    /// Extract signals from one message. Never fails.
    pub fn extract(&self, raw_text: &str) -> Intent {
        let lowered = raw_text.trim().to_lowercase();
        if lowered.is_empty() {
            return Intent::default();
        }

        let location = self.places.find(&lowered).map(str::to_string);

        let mut intent = Intent {
            greeting: self.greeting.is_match(&lowered),
            // The euro sign is not a word character, so it can't sit inside `\b`.
            price_question: self.price.is_match(&lowered) || lowered.contains('€'),
            meeting_interest: self.meeting.is_match(&lowered),
            trust_concern: self.trust.is_match(&lowered),
            positive_signal: self.positive.is_match(&lowered),
            compliment: self.compliment.is_match(&lowered),
            availability: self.availability.is_match(&lowered),
            location_mention: location.is_some(),
            age_question: self.age.is_match(&lowered),
            location_question: self.location_question.is_match(&lowered),
            interest_level: 0,
            location,
        };
        intent.interest_level = interest_level(&intent);

        debug!(
            interest_level = intent.interest_level,
            location = ?intent.location,
            "Extracted intent"
        );

        intent
    }
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Weighted sum of the positive flags.
fn interest_level(intent: &Intent) -> u32 {
    let mut level = 0;
    if intent.positive_signal {
        level += WEIGHT_POSITIVE;
    }
    if intent.meeting_interest {
        level += WEIGHT_MEETING;
    }
    if intent.price_question && !intent.trust_concern {
        level += WEIGHT_PRICE;
    }
    if intent.compliment {
        level += WEIGHT_COMPLIMENT;
    }
    if intent.availability {
        level += WEIGHT_AVAILABILITY;
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Intent {
        IntentExtractor::new().extract(text)
    }

    #[test]
    fn greeting_with_punctuation() {
        let intent = extract("Oi, tudo bem?");
        assert!(intent.greeting);
        assert!(!intent.price_question);
        assert_eq!(intent.interest_level, 0);
        assert!(intent.location.is_none());
    }

    #[test]
    fn empty_and_whitespace_are_neutral() {
        assert!(extract("").is_neutral());
        assert!(extract("   \n\t").is_neutral());
    }

    #[test]
    fn no_keywords_is_neutral() {
        let intent = extract("hmm ok então");
        assert!(intent.is_neutral());
    }

    #[test]
    fn whole_words_only() {
        // "oito" contains "oi", "simples" contains "sim", "topo" contains "top"
        let intent = extract("oito simples topo");
        assert!(!intent.greeting);
        assert!(!intent.positive_signal);
    }

    #[test]
    fn accented_words_match() {
        let intent = extract("Qual é o PREÇO? Estás disponível amanhã?");
        assert!(intent.price_question);
        assert!(intent.availability);
        assert!(intent.meeting_interest);
    }

    #[test]
    fn euro_sign_is_a_price_question() {
        assert!(extract("são 20€?").price_question);
    }

    #[test]
    fn interest_level_weights_are_additive() {
        // positive(2) + meeting(3) + price(2) + compliment(1) + availability(2)
        let intent = extract("sim quero marcar, quanto custa? linda, estou livre");
        assert_eq!(intent.interest_level, 10);
    }

    #[test]
    fn price_does_not_count_alongside_trust_concern() {
        let intent = extract("quanto custa essa taxa?");
        assert!(intent.price_question);
        assert!(intent.trust_concern);
        assert_eq!(intent.interest_level, 0);
    }

    #[test]
    fn first_place_in_text_wins() {
        let intent = extract("moro em Faro mas trabalho no Porto");
        assert_eq!(intent.location.as_deref(), Some("faro"));
        assert!(intent.location_mention);
    }

    #[test]
    fn informational_flags_do_not_score() {
        let intent = extract("quantos anos tens? de onde és?");
        assert!(intent.age_question);
        assert!(intent.location_question);
        assert_eq!(intent.interest_level, 0);
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = IntentExtractor::new();
        let text = "Olá linda, quero saber o valor para hoje em Lisboa";
        let first = extractor.extract(text);
        for _ in 0..10 {
            assert_eq!(extractor.extract(text), first);
        }
    }

    #[test]
    fn keyword_set_find_is_leftmost() {
        let set = KeywordSet::new(&["b", "a"]);
        assert_eq!(set.find("x a b"), Some("a"));
        assert_eq!(set.find("nothing"), None);
    }
}
