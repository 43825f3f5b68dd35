#![warn(missing_docs)]
//! Vigil is the alerting core of a situational-awareness application: it
//! continuously evaluates user-defined conditions against real-time data
//! feeds and maintains a live, observable collection of the alerts those
//! conditions produce.
//!
//! The pieces, leaf to root: an [`source::AlertSource`] abstracts one
//! real-time feed, an [`target::AlertTarget`] abstracts what a feed is
//! compared against, a [`models::condition::AlertCondition`] binds the two
//! via a test, and every satisfied (condition, source instance) pairing is
//! surfaced as a [`models::condition_data::AlertConditionData`] entry in the
//! shared [`engine::list_model::AlertListModel`]. Controllers in [`engine`]
//! drive the evaluation lifecycle and derive aggregates from the model.
//!
//! The whole graph is single-threaded by contract; feeds running on other
//! threads marshal their updates through the
//! [`engine::feed_loop::EvaluationLoop`].

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod models;
pub mod registry;
pub mod source;
pub mod target;
pub mod test_helpers;
