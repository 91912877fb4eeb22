// handlers/elevated/mod.rs - Operator handlers
//
// Route Prefix: /api/root/*
// These work on the shared registry with unbound sessions and never run
// inside a tenant context.

pub mod root;
