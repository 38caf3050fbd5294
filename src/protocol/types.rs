use uuid::Uuid;

/// Unique identifier for players, shared by every process in the cluster.
pub type PlayerId = Uuid;
