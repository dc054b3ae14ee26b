//! visitor pattern helpers
mod visit_strings;
pub use visit_strings::VisitStringsMut;

/// Visitor that visits its subjects mutably
///
/// Each subject is addressed by its dotted field path (`network.subnets[0].cidr`).
/// The first error stops the walk.
pub trait VisitMut<T, E> {
    fn visit_mut(&mut self, path: &str, value: &mut T) -> Result<(), E>;
}

// blanket impl for FnMut
impl<T, E, F> VisitMut<T, E> for F
where
    F: FnMut(&str, &mut T) -> Result<(), E>,
{
    fn visit_mut(&mut self, path: &str, value: &mut T) -> Result<(), E> {
        self(path, value)
    }
}
