//! Data models for contactsync.
//!
//! This module contains the domain models of the local replica:
//! - Contact (with its child records)
//! - Group

pub mod contact;
pub mod group;

pub use contact::{
    normalize_phone, Address, Contact, Email, Event, InstantMessage, PhoneNumber, Website,
};
pub use group::Group;
