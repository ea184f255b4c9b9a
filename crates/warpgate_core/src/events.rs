use crossbeam::channel::{self, Receiver, SendError, Sender};

pub struct EventSender<T> {
    tx: Sender<T>,
}

pub struct EventReceiver<T> {
    rx: Receiver<T>,
}

pub fn channel<T>() -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = channel::unbounded();
    (EventSender { tx }, EventReceiver { rx })
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> EventSender<T> {
    pub fn send(&self, event: T) -> Result<(), SendError<T>> {
        self.tx.send(event)
    }
}

impl<T> EventReceiver<T> {
    /// Takes every event queued so far without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
