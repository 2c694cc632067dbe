//! A thin [`Tx`] abstraction over different channel kinds, so
//! [`Controller::background`](../keel_core/controller/struct.Controller.html)
//! can hand the caller a cancel handle without committing every caller to
//! the same channel implementation.

use std::sync::mpsc;

/// A transmitter capable of sending an `Item`, abstracting over the
/// concrete channel implementation.
pub trait Tx<Item> {
    type Error: std::fmt::Debug;

    fn send(&self, item: Item) -> Result<(), Self::Error>;
}

/// [`Tx`] implementation over `std::sync::mpsc::Sender`.
#[derive(Debug, Clone)]
pub struct MpscTx<Item>(pub mpsc::Sender<Item>);

impl<Item> Tx<Item> for MpscTx<Item> {
    type Error = mpsc::SendError<Item>;

    fn send(&self, item: Item) -> Result<(), Self::Error> {
        self.0.send(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpsc_tx_delivers() {
        let (tx, rx) = mpsc::channel();
        let tx = MpscTx(tx);
        tx.send(42).unwrap();
        assert_eq!(rx.recv().unwrap(), 42);
    }
}
