//! In-process source fed through a tokio channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{OpenSource, Source};
use crate::error::SourceError;
use crate::event::RawEvent;

/// Create a bounded channel whose receiving half is a source.
///
/// The stream ends once every sender has been dropped.
pub fn channel(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<RawEvent>, ChannelSource) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (sender, ChannelSource::new(name, receiver))
}

#[derive(Debug)]
pub struct ChannelSource {
    name: String,
    receiver: mpsc::Receiver<RawEvent>,
}

impl ChannelSource {
    pub fn new(name: impl Into<String>, receiver: mpsc::Receiver<RawEvent>) -> Self {
        Self {
            name: name.into(),
            receiver,
        }
    }
}

#[async_trait]
impl Source for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError> {
        Ok(self.receiver.recv().await)
    }

    async fn close(&mut self) {
        self.receiver.close();
    }
}

#[async_trait]
impl OpenSource for ChannelSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn open(self: Box<Self>) -> Result<Box<dyn Source>, SourceError> {
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HierarchyEvent;
    use crate::translate::testing::at;

    #[tokio::test]
    async fn test_ends_when_senders_drop() {
        let (sender, source) = channel("test", 2);
        let mut source = Box::new(source).open().await.unwrap();

        sender
            .send(RawEvent::hierarchy(at(1), HierarchyEvent::default()))
            .await
            .unwrap();
        drop(sender);

        assert!(source.next_event().await.unwrap().is_some());
        assert!(source.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_rejects_further_sends() {
        let (sender, mut source) = channel("test", 2);

        source.close().await;

        assert!(sender.send(RawEvent::hierarchy(at(1), HierarchyEvent::default())).await.is_err());
        assert_eq!(Source::name(&source), "test");
    }
}
