pub mod pii;

pub use pii::{censor_back, censor_email, censor_front};
