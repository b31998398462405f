//! Hand feature vectors for sign classification.
//!
//! Per hand: 63 raw coordinates, 9 key-pair distances and 6 joint angles
//! in degrees. Hands are concatenated in detection order.

use crate::types::{BoundingBox, Hand, Landmark, LANDMARKS_PER_HAND};

/// Wrist to each fingertip, then adjacent fingertips.
const KEY_PAIRS: [(usize, usize); 9] = [
    (0, 4),
    (0, 8),
    (0, 12),
    (0, 16),
    (0, 20),
    (4, 8),
    (8, 12),
    (12, 16),
    (16, 20),
];

/// (vertex, a, b): angle at `vertex` between the rays to `a` and `b`.
const ANGLE_TRIPLETS: [(usize, usize, usize); 6] = [
    (0, 1, 2),
    (1, 2, 3),
    (5, 6, 7),
    (9, 10, 11),
    (13, 14, 15),
    (17, 18, 19),
];

pub const FEATURES_PER_HAND: usize = LANDMARKS_PER_HAND * 3 + KEY_PAIRS.len() + ANGLE_TRIPLETS.len();

/// Padding added on each side of the hand box, as a fraction of its size.
const BOX_PADDING: f32 = 0.1;

fn distance(a: &Landmark, b: &Landmark) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

fn angle_deg(vertex: &Landmark, a: &Landmark, b: &Landmark) -> f32 {
    let v1 = [a.x - vertex.x, a.y - vertex.y, a.z - vertex.z];
    let v2 = [b.x - vertex.x, b.y - vertex.y, b.z - vertex.z];
    let dot: f32 = v1.iter().zip(&v2).map(|(p, q)| p * q).sum();
    let n1 = v1.iter().map(|v| v * v).sum::<f32>().sqrt();
    let n2 = v2.iter().map(|v| v * v).sum::<f32>().sqrt();
    if n1 == 0.0 || n2 == 0.0 {
        return 0.0;
    }
    (dot / (n1 * n2)).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Feature vector for one hand. Pairs or triplets referring past the end
/// of a short landmark list are omitted.
pub fn hand_features(landmarks: &[Landmark]) -> Vec<f32> {
    let mut out = Vec::with_capacity(FEATURES_PER_HAND);
    for lm in landmarks {
        out.extend([lm.x, lm.y, lm.z]);
    }
    for &(i, j) in &KEY_PAIRS {
        if let (Some(a), Some(b)) = (landmarks.get(i), landmarks.get(j)) {
            out.push(distance(a, b));
        }
    }
    for &(v, i, j) in &ANGLE_TRIPLETS {
        if let (Some(c), Some(a), Some(b)) = (landmarks.get(v), landmarks.get(i), landmarks.get(j)) {
            out.push(angle_deg(c, a, b));
        }
    }
    out
}

/// Concatenated features of every hand; empty when there are no hands.
pub fn features(hands: &[Hand]) -> Vec<f32> {
    hands.iter().flat_map(|h| hand_features(&h.landmarks)).collect()
}

/// Box around all landmarks of all hands, padded and clamped to [0, 1].
pub fn bounding_box(hands: &[Hand]) -> Option<BoundingBox> {
    let mut points = hands.iter().flat_map(|h| h.landmarks.iter());
    let first = points.next()?;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let w = max_x - min_x;
    let h = max_y - min_y;
    let x0 = (min_x - BOX_PADDING * w).max(0.0);
    let y0 = (min_y - BOX_PADDING * h).max(0.0);
    let x1 = (max_x + BOX_PADDING * w).min(1.0);
    let y1 = (max_y + BOX_PADDING * h).min(1.0);

    Some(BoundingBox {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Handedness;

    fn lm(x: f32, y: f32, z: f32) -> Landmark {
        Landmark { x, y, z }
    }

    /// 21 landmarks on a diagonal, spaced 0.02 apart.
    fn diagonal_hand() -> Vec<Landmark> {
        (0..LANDMARKS_PER_HAND)
            .map(|i| {
                let t = 0.3 + i as f32 * 0.02;
                lm(t, t, 0.0)
            })
            .collect()
    }

    fn hand(landmarks: Vec<Landmark>) -> Hand {
        Hand {
            landmarks,
            handedness: Handedness::Right,
            score: 0.9,
        }
    }

    #[test]
    fn test_feature_length() {
        assert_eq!(FEATURES_PER_HAND, 78);
        let f = hand_features(&diagonal_hand());
        assert_eq!(f.len(), FEATURES_PER_HAND);

        let two = features(&[hand(diagonal_hand()), hand(diagonal_hand())]);
        assert_eq!(two.len(), 2 * FEATURES_PER_HAND);
        assert!(features(&[]).is_empty());
    }

    #[test]
    fn test_distances_follow_key_pairs() {
        let f = hand_features(&diagonal_hand());
        // (0, 4): 4 steps of 0.02 along both axes
        let expected = (2.0f32 * 0.08 * 0.08).sqrt();
        assert!((f[63] - expected).abs() < 1e-5, "got {}", f[63]);
    }

    #[test]
    fn test_collinear_angles_are_straight() {
        let f = hand_features(&diagonal_hand());
        // Each vertex sits at the end of a straight run, so both rays
        // point the same way.
        let angles = &f[72..78];
        assert!(angles.iter().all(|a| a.abs() < 0.1), "got {angles:?}");
    }

    #[test]
    fn test_right_angle() {
        let a = angle_deg(&lm(0.0, 0.0, 0.0), &lm(1.0, 0.0, 0.0), &lm(0.0, 1.0, 0.0));
        assert!((a - 90.0).abs() < 1e-4);
        assert_eq!(angle_deg(&lm(0.0, 0.0, 0.0), &lm(0.0, 0.0, 0.0), &lm(1.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_short_landmark_list_skips_missing() {
        let f = hand_features(&diagonal_hand()[..5]);
        // 15 coordinates + (0,4) distance + (0,1,2) and (1,2,3) angles
        assert_eq!(f.len(), 15 + 1 + 2);
    }

    #[test]
    fn test_bounding_box_padding_and_clamp() {
        let b = bounding_box(&[hand(vec![lm(0.2, 0.4, 0.0), lm(0.6, 0.8, 0.0)])]).unwrap();
        assert!((b.x - 0.16).abs() < 1e-6);
        assert!((b.y - 0.36).abs() < 1e-6);
        assert!((b.width - 0.48).abs() < 1e-6);
        assert!((b.height - 0.48).abs() < 1e-6);

        let edge = bounding_box(&[hand(vec![lm(0.0, 0.0, 0.0), lm(1.0, 1.0, 0.0)])]).unwrap();
        assert_eq!(edge, BoundingBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0 });
        assert!(bounding_box(&[]).is_none());
    }
}
