#![allow(ambiguous_glob_reexports)]

pub mod initialize;
pub mod update_config;
pub mod start_round;
pub mod entrance_fee;
pub mod enter;
pub mod close_round;
pub mod fulfill_random_words;
pub mod payout_winner;
pub mod park_prize;
pub mod claim_prize;

pub use initialize::*;
pub use update_config::*;
pub use start_round::*;
pub use entrance_fee::*;
pub use enter::*;
pub use close_round::*;
pub use fulfill_random_words::*;
pub use payout_winner::*;
pub use park_prize::*;
pub use claim_prize::*;
