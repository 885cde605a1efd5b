//! # Kanzi Entropy
//!
//! Bit-exact entropy coders built on [`kanzi_core`]'s bitstream: canonical
//! Huffman coding, order-0 byte-wise range coding, order-0/order-1 rANS, and
//! a family of predictor-driven binary arithmetic coders (FPAQ, CM, TPAQ).
//!
//! [`factory`] ties every coder together behind one [`factory::EntropyKind`]
//! dispatch and chunk-framed stream format; most callers only need that
//! module and [`kanzi_core::bitstream`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod alphabet;
pub mod ans_coder;
pub mod apm;
pub mod binary_coder;
pub mod factory;
pub mod huffman;
pub mod logistic;
pub mod predictors;
pub mod range_coder;

pub use factory::{compress, decompress, EntropyKind};
