//! Internal testing utilities for the netcost crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

mod fixtures;

pub use fixtures::{network, NodeFixture};

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// Create a struct, conventionally named `Case`, holding the data for one
/// test case, collect the cases into an array or `Vec` and call `test_each`
/// with the test function.
///
/// All cases are run, catching panics. If any case fails, `test_each` panics
/// with the number of failures and the debug representation of each failing
/// case.
///
/// ```
/// use netcost_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///     shape: Vec<usize>,
///     expected: usize,
/// }
///
/// let cases = [
///     Case { shape: vec![1, 3, 4], expected: 12 },
///     Case { shape: vec![], expected: 1 },
/// ];
///
/// cases.test_each(|case| {
///     assert_eq!(case.shape.iter().product::<usize>(), case.expected);
/// });
/// ```
///
/// Cases and any values captured by the test function must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call `test` with a reference to each case, catching any panics.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes cases by
    /// value. Each case is formatted before the test runs so it can be
    /// reported on failure.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<I::Item> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(&failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let test = &test;
        let failures: Vec<String> = self
            .into_iter()
            .filter_map(|case| {
                let case_str = format!("{:?}", case);
                std::panic::catch_unwind(move || test(case))
                    .is_err()
                    .then_some(case_str)
            })
            .collect();
        report_failures(&failures);
    }
}

fn report_failures<T: Debug>(failures: &[T]) {
    assert_eq!(
        failures.len(),
        0,
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}
