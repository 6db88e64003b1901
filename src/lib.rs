//! Kubernetes execution backend for pipeline steps.
//!
//! `podstep` runs each step of a CI pipeline as a single pod. A run owns one
//! namespace: it is created on setup, every step becomes a pod named after the
//! step, and the whole namespace is deleted on teardown. Exit codes are read
//! from the pod's terminated container state and surfaced to the caller.
//!
//! # Modules
//!
//! - [`api`]: Library-facing orchestration behind each CLI command
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: The Kubernetes engine, its cluster seams, and step types
//! - [`error`]: Semantic error types for the application

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
