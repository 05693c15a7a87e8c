//! Selection/playback store
//!
//! The phrase being assembled: an ordered list of tapped cards, duplicates
//! allowed. Purely in-memory and synchronous.

use aac_common::config::SpeechConfig;
use aac_common::Card;
use tracing::{debug, info};

/// Text plus voice settings handed to speech synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
}

/// Speech side effect
pub trait Speaker: Send + Sync {
    fn speak(&self, utterance: &Utterance);
}

/// Speaker that only logs (headless runs)
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, utterance: &Utterance) {
        info!(lang = %utterance.lang, rate = utterance.rate, "Speaking: {}", utterance.text);
    }
}

#[derive(Debug, Clone)]
pub struct SelectionStore {
    entries: Vec<Card>,
    lang: String,
    rate: f32,
}

impl SelectionStore {
    pub fn new(speech: &SpeechConfig) -> Self {
        Self {
            entries: Vec::new(),
            lang: speech.language.clone(),
            rate: speech.rate,
        }
    }

    pub fn add_entry(&mut self, card: Card) {
        debug!(card_id = %card.id, "Card added to phrase");
        self.entries.push(card);
    }

    /// Remove the first entry for `card_id`; returns whether one was removed
    pub fn remove_entry(&mut self, card_id: &str) -> bool {
        match self.entries.iter().position(|c| c.id == card_id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Card> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[Card] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spoken form of the phrase: each entry's speech text, space-separated
    pub fn phrase_text(&self) -> String {
        self.entries
            .iter()
            .map(Card::speech_text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Speak the phrase; an empty phrase does nothing
    pub fn speak_phrase(&self, speaker: &dyn Speaker) -> Option<Utterance> {
        if self.entries.is_empty() {
            return None;
        }

        let utterance = Utterance {
            text: self.phrase_text(),
            lang: self.lang.clone(),
            rate: self.rate,
        };
        speaker.speak(&utterance);
        Some(utterance)
    }
}
