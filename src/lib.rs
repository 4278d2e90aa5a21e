//! Authentication and data-access helpers for a personal expense tracker.
//!
//! The crate presents a narrow, validated, typed surface over two external
//! collaborators: an identity provider (sign-up/sign-in/sign-out, auth-state
//! observation, bearer tokens) and a document database holding a per-user
//! expense collection. Both collaborators sit behind trait seams in
//! [`providers`], with in-memory implementations for tests and local
//! development. [`services`] layers session handling and expense CRUD on
//! top, and [`http`] provides token-bearing HTTP fetch.

pub mod http;
pub mod models;
pub mod providers;
pub mod services;
pub mod validation;
