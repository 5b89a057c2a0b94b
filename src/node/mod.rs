//! Node module - control of the nodes under test and topology helpers.

pub mod control;
pub mod topology;

pub use control::{start_all, stop_all, NodeControl, RemoteNode};
pub use topology::{
    connect_chain, connect_nodes, next_available_port, top_up_miner_wallet, wait_for_operation_state,
    wait_for_pop_mempool,
};
