//! Best-effort total count estimation.

/// Turns the total reported by a provider into a usable estimate.
///
/// Providers often report `0` or the size of the current page instead of the
/// number of matches. When counting was requested and `0` is reported for a
/// non-empty page, the total is extrapolated from the page. When more items
/// were skipped than reported, the skipped items (plus the current page when
/// something was reported) are used instead. `None` means the provider did
/// not count and stays `None`.
///
/// ```
/// use eogate_engine::reconcile_total;
///
/// // Page 3 of 10 items, provider says 0 and counting was not requested.
/// assert_eq!(reconcile_total(false, Some(0), 3, 10, 2), Some(20));
/// // Counting requested: extrapolate from the page.
/// assert_eq!(reconcile_total(true, Some(0), 3, 10, 2), Some(6));
/// assert_eq!(reconcile_total(true, None, 3, 10, 2), None);
/// ```
pub fn reconcile_total(count: bool, reported: Option<u64>, page: u32, items_per_page: u32, returned: usize) -> Option<u64> {
    let reported = reported?;
    let returned = returned as u64;
    if count && reported == 0 && page > 0 {
        return Some(returned * u64::from(page));
    }
    let skipped = u64::from(items_per_page) * u64::from(page.saturating_sub(1));
    if skipped > reported {
        return Some(if reported != 0 { skipped + returned } else { skipped });
    }
    Some(reported)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn zero_reported_without_counting_uses_skipped_items() {
        assert_eq!(reconcile_total(false, Some(0), 3, 10, 2), Some(20));
    }

    #[test]
    fn under_reporting_provider_adds_current_page() {
        assert_eq!(reconcile_total(true, Some(5), 3, 10, 4), Some(24));
        assert_eq!(reconcile_total(false, Some(5), 3, 10, 4), Some(24));
    }

    #[test]
    fn plausible_totals_are_kept() {
        assert_eq!(reconcile_total(true, Some(120), 2, 10, 10), Some(120));
        assert_eq!(reconcile_total(false, Some(0), 1, 10, 0), Some(0));
    }

    proptest! {
        #[test]
        fn estimate_never_decreases_with_page(
            count in any::<bool>(),
            reported in 0u64..500,
            items_per_page in 1u32..200,
            returned_ratio in 0.0f64..=1.0,
            page in 1u32..1000,
        ) {
            let returned = (f64::from(items_per_page) * returned_ratio) as usize;
            let current = reconcile_total(count, Some(reported), page, items_per_page, returned);
            let next = reconcile_total(count, Some(reported), page + 1, items_per_page, returned);
            prop_assert!(next >= current, "page {} -> {:?}, page {} -> {:?}", page, current, page + 1, next);
        }
    }
}
