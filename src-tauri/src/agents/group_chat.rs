use super::{is_termination_msg, Participant, Transcript, TranscriptMessage};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last message ended with the termination sentinel.
    Terminated,
    /// `max_round` messages were exchanged.
    RoundLimit,
    /// The scheduled speaker declined to reply.
    NoReply,
}

#[derive(Debug, Clone)]
pub struct ChatRun {
    pub transcript: Transcript,
    pub stop: StopReason,
}

fn broadcast(participants: &mut [&mut dyn Participant], message: &TranscriptMessage) {
    for p in participants.iter_mut() {
        p.receive(message);
    }
}

/// Run a chat in fixed cyclic speaker order.
///
/// `opening` is spoken by `participants[initiator]` and counts as the first
/// round; the next speaker is the one after the initiator. The chat stops when
/// `max_round` messages exist, when the latest message is a termination
/// message, or when the scheduled speaker returns no reply.
pub async fn run_round_robin(
    participants: &mut [&mut dyn Participant],
    initiator: usize,
    opening: String,
    max_round: usize,
) -> Result<ChatRun> {
    if participants.is_empty() || initiator >= participants.len() {
        return Err(Error::Transcript("group chat needs an initiator".into()));
    }

    let mut transcript = Transcript::default();
    let first = TranscriptMessage {
        role: participants[initiator].role(),
        name: participants[initiator].name().to_string(),
        content: opening,
    };
    broadcast(participants, &first);
    transcript.push(first);

    let mut speaker = initiator;
    let stop = loop {
        if transcript.len() >= max_round {
            break StopReason::RoundLimit;
        }
        if transcript.last().is_some_and(|m| is_termination_msg(&m.content)) {
            break StopReason::Terminated;
        }

        speaker = (speaker + 1) % participants.len();
        let Some(content) = participants[speaker].generate_reply().await? else {
            break StopReason::NoReply;
        };
        let message = TranscriptMessage {
            role: participants[speaker].role(),
            name: participants[speaker].name().to_string(),
            content,
        };
        tracing::debug!(
            round = transcript.len() + 1,
            speaker = %message.name,
            "group chat turn"
        );
        broadcast(participants, &message);
        transcript.push(message);
    };

    tracing::info!(rounds = transcript.len(), stop = ?stop, "group chat finished");
    Ok(ChatRun { transcript, stop })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentRole, AgentSession};
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Replies from a fixed script; `None` entries decline.
    struct Scripted {
        name: String,
        role: AgentRole,
        replies: VecDeque<Option<String>>,
        session: AgentSession,
    }

    impl Scripted {
        fn new(name: &str, role: AgentRole, replies: &[Option<&str>]) -> Self {
            Self {
                name: name.into(),
                role,
                replies: replies.iter().map(|r| r.map(String::from)).collect(),
                session: AgentSession::default(),
            }
        }

        fn endless(name: &str, role: AgentRole) -> Self {
            let replies: Vec<Option<&str>> = vec![Some(name); 20];
            Self::new(name, role, &replies)
        }
    }

    #[async_trait]
    impl Participant for Scripted {
        fn name(&self) -> &str {
            &self.name
        }
        fn role(&self) -> AgentRole {
            self.role
        }
        fn receive(&mut self, message: &TranscriptMessage) {
            self.session.record(message);
        }
        async fn generate_reply(&mut self) -> Result<Option<String>> {
            Ok(self.replies.pop_front().flatten())
        }
        fn reset(&mut self) {
            self.session.reset();
        }
    }

    fn speakers(run: &ChatRun) -> Vec<String> {
        run.transcript.iter().map(|m| m.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_round_robin_order_until_round_cap() {
        let mut proxy = Scripted::endless("proxy", AgentRole::RetrieveProxy);
        let mut specialist = Scripted::endless("specialist", AgentRole::Specialist);
        let mut formatter = Scripted::endless("formatter", AgentRole::Formatter);

        let run = run_round_robin(
            &mut [&mut proxy, &mut specialist, &mut formatter],
            0,
            "opening".into(),
            12,
        )
        .await
        .unwrap();

        assert_eq!(run.stop, StopReason::RoundLimit);
        assert_eq!(run.transcript.len(), 12);
        let expected: Vec<String> = ["proxy", "specialist", "formatter"]
            .iter()
            .cycle()
            .take(12)
            .map(|s| s.to_string())
            .collect();
        assert_eq!(speakers(&run), expected);
        // Every participant saw every message, including its own.
        assert_eq!(specialist.session.messages().len(), 12);
    }

    #[tokio::test]
    async fn test_stops_on_termination_sentinel() {
        let mut proxy = Scripted::endless("proxy", AgentRole::RetrieveProxy);
        let mut specialist = Scripted::new(
            "specialist",
            AgentRole::Specialist,
            &[Some("analysis"), Some("all set, terminate")],
        );
        let mut formatter = Scripted::endless("formatter", AgentRole::Formatter);

        let run = run_round_robin(
            &mut [&mut proxy, &mut specialist, &mut formatter],
            0,
            "opening".into(),
            12,
        )
        .await
        .unwrap();

        assert_eq!(run.stop, StopReason::Terminated);
        assert_eq!(
            speakers(&run),
            vec!["proxy", "specialist", "formatter", "proxy", "specialist"]
        );
    }

    #[tokio::test]
    async fn test_stops_when_speaker_declines() {
        let mut proxy = Scripted::new("proxy", AgentRole::RetrieveProxy, &[None]);
        let mut specialist = Scripted::endless("specialist", AgentRole::Specialist);
        let mut formatter = Scripted::endless("formatter", AgentRole::Formatter);

        let run = run_round_robin(
            &mut [&mut proxy, &mut specialist, &mut formatter],
            0,
            "opening".into(),
            12,
        )
        .await
        .unwrap();

        assert_eq!(run.stop, StopReason::NoReply);
        assert_eq!(run.transcript.len(), 3);
    }

    #[tokio::test]
    async fn test_two_party_single_exchange() {
        let mut proxy = Scripted::endless("proxy", AgentRole::RetrieveProxy);
        let mut assistant = Scripted::new("assistant", AgentRole::Assistant, &[Some("answer")]);

        let run = run_round_robin(&mut [&mut proxy, &mut assistant], 0, "question".into(), 2)
            .await
            .unwrap();

        assert_eq!(run.stop, StopReason::RoundLimit);
        assert_eq!(speakers(&run), vec!["proxy", "assistant"]);
    }

    #[tokio::test]
    async fn test_opening_may_terminate_immediately() {
        let mut proxy = Scripted::endless("proxy", AgentRole::RetrieveProxy);
        let mut assistant = Scripted::endless("assistant", AgentRole::Assistant);
        let run = run_round_robin(&mut [&mut proxy, &mut assistant], 0, "TERMINATE".into(), 12)
            .await
            .unwrap();
        assert_eq!(run.stop, StopReason::Terminated);
        assert_eq!(run.transcript.len(), 1);
    }
}
