use image::RgbImage;
use rand::rngs::StdRng;
use rand::SeedableRng;

use swim_magnifier::{sample_lanes, FrameLabel, HeadPosition, SamplingParams, WindowSize};

fn lanes_with_heads(n: usize) -> (Vec<RgbImage>, Vec<FrameLabel>) {
    let lanes = (0..n).map(|_| RgbImage::new(200, 108)).collect();
    let labels = (0..n)
        .map(|i| {
            let head = HeadPosition::new(20.0 + 16.0 * i as f64, 10.0 + 9.0 * i as f64);
            FrameLabel::new(Some(head), None)
        })
        .collect();
    (lanes, labels)
}

#[test]
fn ten_lanes_give_thirty_windows_respecting_the_margin() {
    let (lanes, labels) = lanes_with_heads(10);
    let params = SamplingParams {
        window: WindowSize::square(50),
        nb_samples: 3,
        distribution: 1.0,
        margin: 5,
        close_to_head: true,
    };
    let mut rng = StdRng::seed_from_u64(2024);
    let (crops, subs) = sample_lanes(&lanes, &labels, &params, &mut rng).unwrap();

    assert_eq!(crops.len(), 30);
    assert_eq!(subs.len(), 30);
    for (k, (crop, sub)) in crops.iter().zip(subs.iter()).enumerate() {
        assert_eq!(crop.dimensions(), (50, 50));
        let (x, y) = sub.head.expect("head must be inside a close-to-head window");
        assert!((5..=44).contains(&x), "x = {} in window {}", x, k);
        assert!((5..=44).contains(&y), "y = {} in window {}", y, k);

        // Windows stay grouped by the lane they came from.
        let source = labels[k / 3].head.unwrap();
        let back = sub.to_image_space().unwrap();
        assert_eq!((back.x, back.y), (source.x.floor(), source.y.floor()));
    }
}

#[test]
fn same_seed_same_windows() {
    let (lanes, labels) = lanes_with_heads(4);
    let params = SamplingParams {
        window: WindowSize::square(30),
        ..SamplingParams::default()
    };
    let run = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        sample_lanes(&lanes, &labels, &params, &mut rng).unwrap().1
    };
    assert_eq!(run(7), run(7));
}

#[test]
fn oversized_window_is_clamped_to_the_lane() {
    let (lanes, labels) = lanes_with_heads(2);
    let params = SamplingParams {
        window: WindowSize::square(150),
        nb_samples: 2,
        distribution: 0.3,
        margin: 10,
        close_to_head: true,
    };
    let mut rng = StdRng::seed_from_u64(1);
    let (crops, subs) = sample_lanes(&lanes, &labels, &params, &mut rng).unwrap();
    for (crop, sub) in crops.iter().zip(subs.iter()) {
        assert_eq!(crop.dimensions(), (150, 108));
        assert_eq!(sub.window, WindowSize::new(150, 108));
        assert_eq!(sub.origin.1, 0);
        assert!(sub.origin.0 + 150 <= 200);
    }
}

#[test]
fn unbiased_windows_may_miss_the_head() {
    let mut lanes = vec![RgbImage::new(400, 60)];
    let mut labels = vec![FrameLabel::new(Some(HeadPosition::new(5.0, 5.0)), None)];
    lanes.push(RgbImage::new(400, 60));
    labels.push(FrameLabel::new(None, None));
    let params = SamplingParams {
        window: WindowSize::square(20),
        nb_samples: 50,
        distribution: 0.3,
        margin: 2,
        close_to_head: false,
    };
    let mut rng = StdRng::seed_from_u64(9);
    let (crops, subs) = sample_lanes(&lanes, &labels, &params, &mut rng).unwrap();
    assert_eq!(crops.len(), 100);

    for sub in &subs {
        assert!(sub.origin.0 + 20 <= 400 && sub.origin.1 + 20 <= 60);
        if let Some((x, y)) = sub.head {
            assert!(x < 20 && y < 20);
        }
    }
    // The unlabeled lane never produces a head.
    assert!(subs[50..].iter().all(|s| s.head.is_none()));
    // Most uniform windows over a 400 px lane miss a head at x = 5.
    assert!(subs[..50].iter().filter(|s| s.head.is_none()).count() > 25);
}
