//! Credentials Module
//!
//! Durable storage of the access token, refresh token and user snapshot.

mod storage;
mod store;

pub use storage::{FileSlotStorage, SlotStorage, Slots};
pub use store::{
    Credential, CredentialStore, ACCESS_TOKEN_SLOT, REFRESH_TOKEN_SLOT, USER_SLOT,
};
