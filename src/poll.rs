//! Poll bookkeeping exposed to message handlers.
//!
//! A [`Question`] is plain data: the server stores at most one and hands it
//! to handlers, which read and vote on it. Nothing here touches sockets.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while voting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("choice {index} does not exist; question has {choices} choices")]
    UnknownChoice { index: usize, choices: usize },
}

/// A question with a fixed list of choices and one tally per choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    id: Uuid,
    text: String,
    choices: Vec<String>,
    votes: Vec<u64>,
}

impl Question {
    /// Create a question with every tally at zero.
    pub fn new(text: impl Into<String>, choices: Vec<String>) -> Self {
        let votes = vec![0; choices.len()];
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            choices,
            votes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn votes(&self) -> &[u64] {
        &self.votes
    }

    /// Record one vote and return the choice's new tally.
    pub fn vote(&mut self, index: usize) -> Result<u64, PollError> {
        let choices = self.choices.len();
        let tally = self
            .votes
            .get_mut(index)
            .ok_or(PollError::UnknownChoice { index, choices })?;
        *tally += 1;
        Ok(*tally)
    }

    /// Choices paired with their tallies, in declaration order.
    pub fn tally(&self) -> impl Iterator<Item = (&str, u64)> {
        self.choices
            .iter()
            .map(String::as_str)
            .zip(self.votes.iter().copied())
    }

    pub fn total_votes(&self) -> u64 {
        self.votes.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colours() -> Question {
        Question::new(
            "Favourite colour?",
            vec!["red".into(), "green".into(), "blue".into()],
        )
    }

    #[test]
    fn starts_with_zero_tallies() {
        let question = colours();
        assert_eq!(question.text(), "Favourite colour?");
        assert_eq!(question.votes(), &[0, 0, 0]);
        assert_eq!(question.total_votes(), 0);
    }

    #[test]
    fn votes_accumulate_per_choice() {
        let mut question = colours();
        assert_eq!(question.vote(1), Ok(1));
        assert_eq!(question.vote(1), Ok(2));
        assert_eq!(question.vote(2), Ok(1));

        let tally: Vec<_> = question.tally().collect();
        assert_eq!(tally, vec![("red", 0), ("green", 2), ("blue", 1)]);
        assert_eq!(question.total_votes(), 3);
    }

    #[test]
    fn unknown_choice_is_rejected() {
        let mut question = colours();
        assert_eq!(
            question.vote(3),
            Err(PollError::UnknownChoice { index: 3, choices: 3 })
        );
        assert_eq!(question.total_votes(), 0);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(colours().id(), colours().id());
    }
}
