//! Dataset metadata sync and dashboard cloning

pub mod dashboard;
pub mod fanout;
pub mod provision;
pub mod reconcile;
pub mod registry;
pub mod remap;
pub mod schema;
pub mod updater;

pub use dashboard::{
    ClonedDashboard, DashboardCloner, dashboard_filters, fetch_dashboard_filters,
};
pub use fanout::{outcomes_only, pair_with_inputs, run_all, split_outcomes};
pub use provision::{ProvisionedDataset, Provisioner};
pub use reconcile::{
    ColumnUpdatePayload, HierarchyUpdatePayload, ReverseNameIndex, match_columns,
    match_hierarchies, reconcile,
};
pub use registry::DedupRegistry;
pub use remap::{IdRemapTable, build_dataset_remap};
pub use updater::{MetadataUpdater, SyncReport};
