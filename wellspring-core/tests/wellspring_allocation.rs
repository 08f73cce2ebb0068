//! Allocation of a cell's rating across its wellsprings.

use wellspring_core::wellspring::{Wellspring, WellspringRegistry, allocate};
use wellspring_utils::BlockPos;
use wellspring_utils::random::Random;
use wellspring_utils::random::xoroshiro::Xoroshiro;

fn springs(depths: &[f64]) -> Vec<Wellspring> {
    depths
        .iter()
        .enumerate()
        .map(|(i, &depth_factor)| Wellspring {
            position: BlockPos::new(i as i32, 0, 0),
            depth_factor,
        })
        .collect()
}

#[test]
fn shared_cell_starves_shallow_springs() {
    let allocations = allocate(10.0, &springs(&[0.8, 0.5, 0.2]));
    let amounts: Vec<f64> = allocations.iter().map(|a| a.amount).collect();
    assert_eq!(amounts, vec![8.0, 2.0, 0.0]);
    assert_eq!(allocations[0].position, BlockPos::new(0, 0, 0));
}

#[test]
fn single_spring_takes_its_share() {
    let allocations = allocate(40.0, &springs(&[0.25]));
    assert_eq!(allocations[0].amount, 10.0);
}

#[test]
fn no_springs_no_allocations() {
    assert!(allocate(100.0, &[]).is_empty());
}

#[test]
fn allocation_never_exceeds_budget_and_favours_depth() {
    let mut random = Xoroshiro::from_seed(77);
    for _ in 0..500 {
        let count = random.next_i32_between_inclusive(1, 8) as usize;
        let depths: Vec<f64> = (0..count).map(|_| random.next_f64()).collect();
        let budget = f64::from(random.next_i32_between_inclusive(0, 100));

        let allocations = allocate(budget, &springs(&depths));
        assert_eq!(allocations.len(), count);

        let total: f64 = allocations.iter().map(|a| a.amount).sum();
        assert!(total <= budget + 1e-9, "allocated {total} of {budget}");

        for pair in allocations.windows(2) {
            assert!(pair[0].depth_factor >= pair[1].depth_factor);
        }
        for allocation in &allocations {
            assert!(allocation.amount >= 0.0);
            assert!(allocation.amount <= budget * allocation.depth_factor + 1e-9);
        }
    }
}

#[test]
fn registry_groups_by_cell() {
    let registry = WellspringRegistry::new();
    registry.register(BlockPos::new(0, 0, 0), 0.3);
    registry.register(BlockPos::new(15, 15, 15), 0.6);
    registry.register(BlockPos::new(16, 0, 0), 0.9);
    registry.register(BlockPos::new(-1, 0, 0), 0.1);

    let origin = BlockPos::new(0, 0, 0).cell();
    assert_eq!(registry.list_for_cell(origin).len(), 2);
    assert_eq!(registry.list_for_cell(BlockPos::new(16, 0, 0).cell()).len(), 1);
    assert_eq!(registry.list_for_cell(BlockPos::new(-1, 0, 0).cell()).len(), 1);
    assert_eq!(registry.len(), 4);
}
