//! Shorthands for building [`crate::error::ConcurrencyError`] values.

/// Creates a [`crate::error::ConcurrencyError`] from a kind and a static description.
///
/// An optional third argument is rendered with `to_string` and kept as detail. A trailing
/// `source: err` attaches the underlying cause.
#[macro_export]
macro_rules! concurrency_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::ConcurrencyError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::ConcurrencyError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr $(, source: $source:expr)?) => {
        $crate::error::ConcurrencyError::from(($kind, $desc, $detail.to_string()))
            $(.with_source($source))?
    };
}

/// Returns early with an error built by [`concurrency_error!`] from the same arguments.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr $(, $($rest:tt)+)?) => {
        return ::core::result::Result::Err($crate::concurrency_error!(
            $kind,
            $desc
            $(, $($rest)+)?
        ))
    };
}
