//! Integration tests for the fold communicator hierarchy and process grid

mod common;

use common::quick_config;
use lu3d::algorithm::{FoldGroup, fold_block_base};
use lu3d::prelude::*;

/// For every fold level, the set of layers sharing the caller's group,
/// discovered by summing one-hot vectors over the group.
fn membership(nlayers: usize) -> Vec<Vec<Vec<usize>>> {
    let results = run_ranks(nlayers, &quick_config(), |world| {
        let layer = world.rank();
        let hierarchy = CommHierarchy::build(&world, nlayers, layer)?;
        let mut levels = Vec::new();
        for a in 0..hierarchy.depth() {
            let comm = hierarchy.comm(a).expect("level within depth");
            let mut onehot = vec![0.0; nlayers];
            onehot[layer] = 1.0;
            if comm.rank() == 0 {
                comm.reduce_sum(ReduceBuffer::InPlace(&mut onehot), 0)?;
            } else {
                comm.reduce_sum(ReduceBuffer::Send(&onehot), 0)?;
            }
            comm.broadcast_f64(&mut onehot, 0)?;
            assert_eq!(comm.rank(), layer - fold_block_base(layer, a));
            let members: Vec<usize> = (0..nlayers).filter(|&z| onehot[z] == 1.0).collect();
            levels.push(members);
        }
        Ok(levels)
    });
    results.into_iter().map(|r| r.unwrap()).collect()
}

#[test]
fn test_four_layer_groups() {
    let groups = membership(4);
    assert_eq!(groups[0], vec![vec![0, 1], vec![0, 1, 2, 3]]);
    assert_eq!(groups[1], vec![vec![0, 1], vec![0, 1, 2, 3]]);
    assert_eq!(groups[2], vec![vec![2, 3], vec![0, 1, 2, 3]]);
    assert_eq!(groups[3], vec![vec![2, 3], vec![0, 1, 2, 3]]);
}

#[test]
fn test_eight_layer_depth() {
    let groups = membership(8);
    for (layer, levels) in groups.iter().enumerate() {
        assert_eq!(levels.len(), 3);
        for (a, members) in levels.iter().enumerate() {
            let size = 2usize << a;
            let base = layer / size * size;
            let expected: Vec<usize> = (base..base + size).collect();
            assert_eq!(members, &expected, "layer {layer} level {a}");
        }
    }
}

#[test]
fn test_six_layers_leave_a_short_block() {
    let groups = membership(6);
    assert_eq!(groups[4], vec![vec![4, 5], vec![4, 5], vec![0, 1, 2, 3, 4, 5]]);
    assert_eq!(groups[1], vec![vec![0, 1], vec![0, 1, 2, 3], vec![0, 1, 2, 3, 4, 5]]);
}

#[test]
fn test_single_layer_is_solo() {
    let results = run_ranks(1, &quick_config(), |world| {
        let hierarchy = CommHierarchy::build(&world, 1, 0)?;
        let solo = matches!(hierarchy.fold_group(0)?, FoldGroup::Solo);
        let beyond = hierarchy.fold_group(1).is_err();
        Ok((hierarchy.depth(), solo, beyond, world.stats().splits))
    });
    assert_eq!(results[0].as_ref().unwrap(), &(0, true, true, 0));
}

#[test]
fn test_build_rejects_wrong_layer_count() {
    let results = run_ranks(2, &quick_config(), |world| {
        CommHierarchy::build(&world, 3, world.rank()).map(|h| h.depth())
    });
    for r in results {
        assert!(matches!(r, Err(Error::InvalidArgument { arg: "nlayers", .. })));
    }
}

#[test]
fn test_grid_coordinates_and_groups() {
    let results = run_ranks(12, &quick_config(), |world| {
        let grid = ProcessGrid3D::new(&world, 2, 3, 2)?;
        Ok((
            grid.layer(),
            grid.myrow(),
            grid.mycol(),
            grid.row_comm().size(),
            grid.col_comm().size(),
            grid.z_comm().size(),
            grid.z_comm().rank(),
        ))
    });
    for (rank, r) in results.into_iter().enumerate() {
        let (layer, row, col, rsize, csize, zsize, zrank) = r.unwrap();
        assert_eq!(layer, rank / 6);
        assert_eq!(row, (rank % 6) / 3);
        assert_eq!(col, rank % 3);
        assert_eq!((rsize, csize, zsize), (3, 2, 2));
        assert_eq!(zrank, layer);
    }
}
