//! # statusdesk
//!
//! Service status and incident tracking API.
//!
//! Operators record service health and incidents, viewers read the internal
//! dashboard, and the public sees a filtered status page. The core is the
//! incident lifecycle: how opening and resolving an incident drives the
//! status of its service, who may trigger each transition, and what is
//! visible publicly.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers + AuthUser extractor (api/)
//!     │
//!     ├── AuthService (auth/)
//!     ├── Catalog / Incident / StatusPage / User / Audit services (service/)
//!     ├── Authorization policy (domain/)
//!     │
//!     └── Store: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod validation;
