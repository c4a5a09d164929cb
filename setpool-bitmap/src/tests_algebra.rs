use crate::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Values cluster in a few containers so operands overlap.
fn arb_values() -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::vec(
        prop_oneof![0u32..512, 65_000u32..66_000, (u32::MAX - 64)..=u32::MAX],
        0..200,
    )
}

fn handle(values: &[u32]) -> SetHandle {
    values.iter().copied().collect()
}

fn model(values: &[u32]) -> BTreeSet<u32> {
    values.iter().copied().collect()
}

// ===== Single-handle mutation =====

proptest! {
    #[test]
    fn add_then_contains(values in arb_values(), v in any::<u32>()) {
        let mut set = handle(&values);
        set.add(v);
        prop_assert!(set.contains(v));
        prop_assert!(!set.try_add(v));
    }

    #[test]
    fn remove_checked_reports_once(values in arb_values(), v in any::<u32>()) {
        let mut set = handle(&values);
        set.add(v);
        let before = set.len();

        prop_assert!(set.remove_checked(v));
        prop_assert_eq!(set.len(), before - 1);
        prop_assert!(!set.remove_checked(v));
    }

    #[test]
    fn remove_checked_on_empty_is_false(v in any::<u32>()) {
        let mut set = SetHandle::new();
        prop_assert!(!set.remove_checked(v));
        prop_assert!(set.is_empty());
    }

    #[test]
    fn to_vec_matches_model(values in arb_values()) {
        let set = handle(&values);
        let expected: Vec<u32> = model(&values).into_iter().collect();
        prop_assert_eq!(set.to_vec(), expected);
    }
}

// ===== Materializing algebra =====

proptest! {
    #[test]
    fn binary_ops_leave_inputs_untouched(a in arb_values(), b in arb_values()) {
        let (sa, sb) = (handle(&a), handle(&b));
        for op in [BinaryOp::And, BinaryOp::Or, BinaryOp::Xor, BinaryOp::AndNot] {
            op.apply(&sa, &sb).unwrap();
        }
        prop_assert_eq!(sa.to_vec(), model(&a).into_iter().collect::<Vec<_>>());
        prop_assert_eq!(sb.to_vec(), model(&b).into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn binary_ops_match_model(a in arb_values(), b in arb_values()) {
        let (sa, sb) = (handle(&a), handle(&b));
        let (ma, mb) = (model(&a), model(&b));

        let expected: Vec<u32> = ma.intersection(&mb).copied().collect();
        prop_assert_eq!(and(&sa, &sb).unwrap().to_vec(), expected);

        let expected: Vec<u32> = ma.union(&mb).copied().collect();
        prop_assert_eq!(or(&sa, &sb).unwrap().to_vec(), expected);

        let expected: Vec<u32> = ma.symmetric_difference(&mb).copied().collect();
        prop_assert_eq!(xor(&sa, &sb).unwrap().to_vec(), expected);

        let expected: Vec<u32> = ma.difference(&mb).copied().collect();
        prop_assert_eq!(and_not(&sa, &sb).unwrap().to_vec(), expected);
    }

    #[test]
    fn cardinality_bounds(a in arb_values(), b in arb_values()) {
        let (sa, sb) = (handle(&a), handle(&b));
        prop_assert!(or(&sa, &sb).unwrap().len() >= sa.len().max(sb.len()));
        prop_assert!(and(&sa, &sb).unwrap().len() <= sa.len().min(sb.len()));
    }

    #[test]
    fn or_many_equals_chained_or(a in arb_values(), b in arb_values(), c in arb_values()) {
        let (sa, sb, sc) = (handle(&a), handle(&b), handle(&c));
        let chained = or(&or(&sa, &sb).unwrap(), &sc).unwrap();
        prop_assert_eq!(or_many(&[&sa, &sb, &sc]).unwrap(), chained.try_clone().unwrap());
        prop_assert_eq!(or_many(&[&sc, &sa, &sb]).unwrap(), chained);
    }

    #[test]
    fn in_place_matches_materializing(a in arb_values(), b in arb_values()) {
        let (sa, sb) = (handle(&a), handle(&b));

        let mut set = handle(&a);
        set.and_in_place(&sb).unwrap();
        prop_assert_eq!(set, and(&sa, &sb).unwrap());

        let mut set = handle(&a);
        set.xor_in_place(&b).unwrap();
        prop_assert_eq!(set, xor(&sa, &sb).unwrap());

        let mut set = handle(&a);
        set.remove_many(b.clone()).unwrap();
        prop_assert_eq!(set, and_not(&sa, &sb).unwrap());

        let mut set = handle(&a);
        set.add_many(&sb).unwrap();
        prop_assert_eq!(set, or(&sa, &sb).unwrap());
    }

    #[test]
    fn double_swap_restores(a in arb_values(), b in arb_values()) {
        let (mut sa, mut sb) = (handle(&a), handle(&b));
        swap(&mut sa, &mut sb);
        swap(&mut sa, &mut sb);
        prop_assert_eq!(sa, handle(&a));
        prop_assert_eq!(sb, handle(&b));
    }
}

// ===== Ranges =====

proptest! {
    #[test]
    fn add_range_matches_clamped_fill(lower in -100.0f64..300.0, upper in -100.0f64..300.0) {
        let mut set = SetHandle::new();
        set.add_range(lower, upper);

        let lo = lower.max(0.0) as u64;
        let hi = upper.max(0.0) as u64;
        let expected: Vec<u32> = (lo..hi).map(|v| v as u32).collect();
        prop_assert_eq!(set.to_vec(), expected);
    }

    #[test]
    fn flip_range_twice_restores(values in arb_values(), lower in 0u32..1000, width in 0u32..1000) {
        let mut set = handle(&values);
        let (lower, upper) = (lower as f64, (lower + width) as f64);
        set.flip_range(lower, upper);
        set.flip_range(lower, upper);
        prop_assert_eq!(set, handle(&values));
    }
}
