mod chunker;
mod sender;

pub use chunker::split_for_channel;
pub use sender::SafeDelivery;
