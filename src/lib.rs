//! Vigil: clinical decision support for primary-health outreach.
//!
//! A PHW submits an intake (demographics, vitals, medications, symptoms,
//! chief complaint); the hybrid decision engine returns a risk tier with a
//! machine-readable explanation, drug-safety warnings, and a clinician
//! recommendation. High-risk cases escalate to a specialist through a
//! time-bounded magic link, and advice streams back to the PHW in real
//! time over a per-case event channel.

pub mod api;
pub mod bus;
pub mod config;
pub mod db;
pub mod engine;
pub mod handover;
pub mod models;
pub mod token;
