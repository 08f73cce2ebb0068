//! Groundwater aquifer ratings for a voxel world.
//!
//! Each 16×16×16 cell gets a rating in `[0, 100]` describing how much
//! groundwater it holds. Ratings are sampled from the cell's own terrain,
//! smoothed against its neighbours, cached in a versioned record and spent by
//! wellsprings placed in the cell.
//!
//! [`AquiferService`] is the entry point.

pub mod config;
pub mod error;
pub mod rating;
pub mod sampler;
pub mod scheduler;
pub mod service;
pub mod smoother;
pub mod stats;
pub mod store;
pub mod terrain;
pub mod wellspring;

pub use config::AquiferConfig;
pub use error::{AquiferError, CodecError, ServiceError};
pub use rating::{AquiferRecord, Rating};
pub use service::{AquiferService, CellState, DrainReport};
pub use store::{AquiferStore, MemoryStore};
pub use terrain::{CellHandle, SharedCellHandle, VoxelCell, VoxelClass, WorldInfo};
pub use wellspring::{Allocation, Wellspring};
