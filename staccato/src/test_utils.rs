use crate::morpheme::{Features, Morpheme};

/// Builds a bare lattice edge for tests.
pub(crate) fn edge(from: usize, to: usize, form: &str, pos: &str, token: usize) -> Morpheme {
    edge_with_feats(from, to, form, pos, "_", token)
}

/// Builds a lattice edge carrying a feature string.
pub(crate) fn edge_with_feats(
    from: usize,
    to: usize,
    form: &str,
    pos: &str,
    feat_str: &str,
    token: usize,
) -> Morpheme {
    Morpheme {
        id: 0,
        from,
        to,
        form: form.to_string(),
        lemma: form.to_string(),
        cpos: pos.to_string(),
        pos: pos.to_string(),
        feats: Features::parse(feat_str).unwrap(),
        feat_str: if feat_str == "_" {
            String::new()
        } else {
            feat_str.to_string()
        },
        token,
        e_form: 0,
        e_lemma: 0,
        e_pos: 0,
        e_word_pos: 0,
        e_mhost: 0,
        e_msuffix: 0,
    }
}
