//! Depth sorting and alpha compositing shared by the resolve pass model.
//!
//! The WGSL resolve shader performs the same steps on the GPU: an insertion
//! sort over a bounded local array followed by back-to-front alpha-over.

use std::cmp::Ordering;

use crate::fragment::{FragmentNode, Rgba};

/// Total order used by the resolve sort: nearest first.
///
/// Ties on depth fall back to the color channels so that the result never
/// depends on the order fragments were linked in.
pub fn depth_order(a: &FragmentNode, b: &FragmentNode) -> Ordering {
    a.depth
        .total_cmp(&b.depth)
        .then_with(|| a.color.r.total_cmp(&b.color.r))
        .then_with(|| a.color.g.total_cmp(&b.color.g))
        .then_with(|| a.color.b.total_cmp(&b.color.b))
        .then_with(|| a.color.a.total_cmp(&b.color.a))
}

/// Insertion sort by [`depth_order`].
///
/// Fragment lists are bounded by the entries-per-pixel setting (8 by
/// default), where insertion sort beats anything fancier.
pub fn sort_by_depth(fragments: &mut [FragmentNode]) {
    for i in 1..fragments.len() {
        let current = fragments[i];
        let mut j = i;
        while j > 0 && depth_order(&fragments[j - 1], &current) == Ordering::Greater {
            fragments[j] = fragments[j - 1];
            j -= 1;
        }
        fragments[j] = current;
    }
}

/// Returns true if `fragments` is non-decreasing in depth
pub fn is_depth_sorted(fragments: &[FragmentNode]) -> bool {
    fragments.windows(2).all(|w| w[0].depth <= w[1].depth)
}

/// Composite depth-sorted fragments (nearest first) back to front.
///
/// The result is premultiplied: `rgb` already carries coverage and `a` is
/// the total coverage, `1 - prod(1 - a_i)`.
pub fn composite_back_to_front(sorted: &[FragmentNode]) -> Rgba {
    let mut accum = Rgba::TRANSPARENT;
    for fragment in sorted.iter().rev() {
        let c = fragment.color;
        let a = c.a.clamp(0.0, 1.0);
        accum = Rgba::new(
            c.r * a + accum.r * (1.0 - a),
            c.g * a + accum.g * (1.0 - a),
            c.b * a + accum.b * (1.0 - a),
            a + accum.a * (1.0 - a),
        );
    }
    accum
}

/// Blend a premultiplied color over an opaque or straight background
/// (`One, OneMinusSrcAlpha`, the resolve pipeline's blend state).
pub fn blend_over(premultiplied: Rgba, background: Rgba) -> Rgba {
    let t = 1.0 - premultiplied.a;
    Rgba::new(
        premultiplied.r + background.r * t,
        premultiplied.g + background.g * t,
        premultiplied.b + background.b * t,
        premultiplied.a + background.a * t,
    )
}

/// Straight alpha-over in submission order, as fixed-function blending does
/// for the dummy renderer. Order dependent.
pub fn blend_in_submission_order(fragments: &[FragmentNode], background: Rgba) -> Rgba {
    fragments.iter().fold(background, |dst, fragment| {
        let c = fragment.color;
        let a = c.a.clamp(0.0, 1.0);
        Rgba::new(
            c.r * a + dst.r * (1.0 - a),
            c.g * a + dst.g * (1.0 - a),
            c.b * a + dst.b * (1.0 - a),
            a + dst.a * (1.0 - a),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::SENTINEL;

    fn frag(depth: f32, color: Rgba) -> FragmentNode {
        FragmentNode::new(color, depth, SENTINEL)
    }

    #[test]
    fn insertion_sort_orders_nearest_first() {
        let mut list = vec![
            frag(3.0, Rgba::WHITE),
            frag(1.0, Rgba::WHITE),
            frag(2.0, Rgba::WHITE),
            frag(0.5, Rgba::WHITE),
        ];
        sort_by_depth(&mut list);
        let depths: Vec<f32> = list.iter().map(|f| f.depth).collect();
        assert_eq!(depths, vec![0.5, 1.0, 2.0, 3.0]);
        assert!(is_depth_sorted(&list));
    }

    #[test]
    fn equal_depths_sort_deterministically() {
        let red = frag(1.0, Rgba::new(1.0, 0.0, 0.0, 0.5));
        let blue = frag(1.0, Rgba::new(0.0, 0.0, 1.0, 0.5));
        let mut a = vec![red, blue];
        let mut b = vec![blue, red];
        sort_by_depth(&mut a);
        sort_by_depth(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_list_composites_to_transparent() {
        assert_eq!(composite_back_to_front(&[]), Rgba::TRANSPARENT);
        let bg = Rgba::new(0.2, 0.3, 0.4, 1.0);
        assert_eq!(blend_over(Rgba::TRANSPARENT, bg), bg);
    }

    #[test]
    fn opaque_front_fragment_hides_everything_behind() {
        let mut list = vec![
            frag(5.0, Rgba::new(0.0, 1.0, 0.0, 0.5)),
            frag(1.0, Rgba::new(1.0, 0.0, 0.0, 1.0)),
        ];
        sort_by_depth(&mut list);
        let out = blend_over(composite_back_to_front(&list), Rgba::BLACK);
        assert_eq!(out, Rgba::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn back_to_front_matches_sequential_blending_of_sorted_list() {
        let mut list = vec![
            frag(1.0, Rgba::new(1.0, 0.0, 0.0, 0.4)),
            frag(2.0, Rgba::new(0.0, 1.0, 0.0, 0.3)),
            frag(3.0, Rgba::new(0.0, 0.0, 1.0, 0.6)),
        ];
        sort_by_depth(&mut list);
        let bg = Rgba::new(0.1, 0.1, 0.1, 1.0);

        let resolved = blend_over(composite_back_to_front(&list), bg);

        let mut far_first = list.clone();
        far_first.reverse();
        let sequential = blend_in_submission_order(&far_first, bg);

        for (x, y) in resolved.to_array().iter().zip(sequential.to_array()) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}
