use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::Result;
use crate::SourceEvent;
use crate::WatchSource;

/// Watch source fed by the test through a channel. Only the first `watch`
/// call gets the events; later calls see a stream that never yields.
pub(crate) struct ChannelWatchSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<SourceEvent>>>>,
}

pub(crate) fn channel_source() -> (mpsc::UnboundedSender<Result<SourceEvent>>, ChannelWatchSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        tx,
        ChannelWatchSource {
            rx: Mutex::new(Some(rx)),
        },
    )
}

impl WatchSource for ChannelWatchSource {
    fn watch(&self) -> BoxStream<'static, Result<SourceEvent>> {
        match self.rx.lock().take() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => futures::stream::pending().boxed(),
        }
    }
}
