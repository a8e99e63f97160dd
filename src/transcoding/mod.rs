//! Background rendition pipeline.
//!
//! A new video fans out one [`job::RenditionJob`] per [`profile::ResolutionProfile`]
//! through a [`queue::JobQueue`]. Workers run the [`encoder::Encoder`] and post a
//! completion to the [`reconcile::Reconciler`], which fills the record's slot at
//! most once. [`dispatcher::UploadEventDispatcher`] owns the lifecycle hooks.

pub mod dispatcher;
pub mod encoder;
pub mod job;
pub mod profile;
pub mod queue;
pub mod reconcile;
