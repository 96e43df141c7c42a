//! Data models for the conversion queue.

mod conversion;

pub use conversion::{AdType, ConversionActionType, ConversionQueueItem, VerifiableConversion};
