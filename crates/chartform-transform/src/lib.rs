//! chartform transform - render charts from remote repositories
//!
//! One run registers the chart's repository, refreshes every configured
//! index, locates and unpacks the chart, layers values, makes sure its
//! dependencies are vendored and renders a manifest. No cluster is contacted.
//!
//! # Example
//!
//! ```no_run
//! use chartform_core::Settings;
//! use chartform_transform::{TransformRequest, transform, SET_ARG};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env()?;
//! let request = TransformRequest::new("linkerd-control-plane", "linkerd", "linkerd", "https://helm.linkerd.io/stable")
//!     .with_namespace("linkerd")
//!     .with_high_availability(true)
//!     .with_override(SET_ARG, "identity.issuer.scheme=kubernetes.io/tls");
//!
//! let result = transform(&settings, &request).await?;
//! println!("{}", result.manifest);
//! # Ok(())
//! # }
//! ```

pub mod chart_engine;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod request;

pub use chart_engine::{ChartEngine, ChartHandle, LocalChartEngine};
pub use error::{ChartEngineError, Result, TransformError};
pub use pipeline::{PipelineState, Transformer, transform};
pub use profile::ChartProfile;
pub use request::{RenderResult, SET_ARG, SET_FILE_ARG, TransformRequest, VALUES_ARG};
