//! Ready-made result comparisons for `SelectorOptions::compare_result`.
//!
//! A comparison returning `true` turns an execution into a phantom run: the
//! previous `Arc` is kept, and selectors depending on this one stay valid.

/// Compare with `==`. This is what `Universe::selector` uses.
pub fn partial_eq<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Never equal: every execution that produces a value is a full run.
pub fn never_equal<T>(_a: &T, _b: &T) -> bool {
    false
}

/// For selectors that keep failures as values (`T = Result<V, E>`): a new
/// failure is never equal to anything, so every failing re-run is full and
/// dependents re-run too. `E` needs no `PartialEq`.
///
/// # Example
/// ```ignore
/// let parsed = universe.selector_with(
///     SelectorOptions::new().compare_result(output_eq::ok_or_invalidate),
///     |ctx, _params, _extra| Ok(ctx.get("input").as_str().unwrap_or_default().parse::<i64>()),
/// );
/// ```
pub fn ok_or_invalidate<T: PartialEq, E>(a: &Result<T, E>, b: &Result<T, E>) -> bool {
    match (a, b) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Like [`ok_or_invalidate`], but any two failures are equal. A selector that
/// keeps failing hands out its first failure, and dependents stay valid.
pub fn ignore_err<T: PartialEq, E>(a: &Result<T, E>, b: &Result<T, E>) -> bool {
    match (a, b) {
        (Ok(a), Ok(b)) => a == b,
        (Err(_), Err(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_comparisons() {
        let ok: Result<i32, String> = Ok(1);
        let err_a: Result<i32, String> = Err("a".into());
        let err_b: Result<i32, String> = Err("b".into());

        assert!(ok_or_invalidate(&ok, &Ok(1)));
        assert!(!ok_or_invalidate(&err_a, &err_a));
        assert!(ignore_err(&err_a, &err_b));
        assert!(!ignore_err(&ok, &err_a));
        assert!(partial_eq(&"x", &"x"));
        assert!(!never_equal(&1, &1));
    }
}
