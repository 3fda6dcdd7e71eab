pub(crate) mod key_pair;
pub(crate) mod rb_tree;
pub(crate) mod static_map;
