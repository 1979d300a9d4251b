//! Klaxon: a self-hosted push alarm dispatcher.
//!
//! The binary loads a [`config::KlaxonConfig`], builds the alarm pipeline
//! from `klaxon-dispatch`, and serves it over HTTP next to the health probes.

pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
