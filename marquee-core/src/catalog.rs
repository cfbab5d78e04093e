use marquee_domain::{Show, ShowId, ShowSeatSpec, StorageError};

/// Read-only probes into the show catalog. Shows, screens and movies are
/// managed elsewhere; the engine only asks what it needs to validate and
/// price an acquisition.
pub trait ShowCatalog: Send + Sync {
    fn show(&self, id: ShowId) -> Result<Option<Show>, StorageError>;

    /// The seats valid for a show, with their price multipliers.
    fn seats_for_show(&self, id: ShowId) -> Result<Vec<ShowSeatSpec>, StorageError>;
}
