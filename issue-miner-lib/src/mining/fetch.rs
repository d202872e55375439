/// Outcome of fetching one resource from the host.
///
/// Only `Failed` represents an error worth reporting; `Missing` is an expected
/// outcome for deleted repositories and similar gaps in the host's data.
#[derive(Debug)]
pub enum Fetch<T> {
    /// The resource was retrieved.
    Found(T),

    /// The host reports that the resource does not exist.
    Missing,

    /// The request failed after all retries.
    Failed(ohno::AppError),
}

impl<T> Fetch<T> {
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetch<U> {
        match self {
            Self::Found(data) => Fetch::Found(f(data)),
            Self::Missing => Fetch::Missing,
            Self::Failed(e) => Fetch::Failed(e),
        }
    }

    /// Returns the data if `Found`, discarding the reason otherwise.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(data) => Some(data),
            Self::Missing | Self::Failed(_) => None,
        }
    }
}
