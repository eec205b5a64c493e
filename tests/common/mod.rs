#![allow(dead_code)]

pub(crate) mod chain;

pub(crate) mod core;

pub(crate) mod keys;

pub(crate) mod logging;

pub(crate) mod network;

pub(crate) mod node;

pub(crate) mod state;
