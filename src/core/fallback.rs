use tracing::debug;

/// One step of an ordered fallback chain. `run` returns `None` when its
/// source is unavailable for the context.
pub struct Attempt<C, T> {
    pub name: &'static str,
    pub run: fn(&C) -> Option<T>,
}

impl<C, T> Attempt<C, T> {
    pub const fn new(name: &'static str, run: fn(&C) -> Option<T>) -> Self {
        Self { name, run }
    }
}

/// Runs `attempts` in order and returns the first value accepted by `accept`
/// together with the name of the attempt that produced it.
pub fn first_valid<C, T>(
    chain: &str,
    ctx: &C,
    attempts: &[Attempt<C, T>],
    accept: impl Fn(&T) -> bool,
) -> Option<(&'static str, T)> {
    for attempt in attempts {
        match (attempt.run)(ctx) {
            Some(value) if accept(&value) => return Some((attempt.name, value)),
            Some(_) => debug!(chain, attempt = attempt.name, "rejected fallback value"),
            None => debug!(chain, attempt = attempt.name, "fallback source unavailable"),
        }
    }
    None
}

pub fn is_positive_finite(value: &f64) -> bool {
    value.is_finite() && *value > 0.0
}

pub fn is_finite(value: &f64) -> bool {
    value.is_finite()
}
