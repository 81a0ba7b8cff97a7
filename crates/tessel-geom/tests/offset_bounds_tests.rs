use tessel_geom::{Axis, Bounds3, Offset3, Rotation};

#[test]
fn offset_constants_and_ops() {
    let a = Offset3::new(1, 2, 3);
    let b = Offset3::new(-4, 5, -6);
    assert_eq!(a + b, Offset3::new(-3, 7, -3));
    assert_eq!((a + b) - a, b);
    assert_eq!(-a, Offset3::new(-1, -2, -3));
    assert!(Offset3::ZERO.is_zero());

    let mut c = a;
    c += b;
    c -= b;
    assert_eq!(c, a);
}

#[test]
fn offset_component_access() {
    let a = Offset3::new(7, -8, 9);
    assert_eq!(a.component(Axis::X), 7);
    assert_eq!(a.component(Axis::VERTICAL), -8);
    assert_eq!(a.with_component(Axis::Z, 0), Offset3::new(7, -8, 0));
}

#[test]
fn offset_order_is_lexicographic() {
    let mut v = vec![
        Offset3::new(0, 0, 1),
        Offset3::new(-1, 5, 5),
        Offset3::new(0, -1, 9),
    ];
    v.sort();
    assert_eq!(
        v,
        vec![
            Offset3::new(-1, 5, 5),
            Offset3::new(0, -1, 9),
            Offset3::new(0, 0, 1)
        ]
    );
}

#[test]
fn offset_distances() {
    let a = Offset3::new(3, 4, 0);
    assert_eq!(a.distance_sq(Offset3::ZERO), 25);
    assert!((a.distance(Offset3::ZERO) - 5.0).abs() < 1e-9);
    assert_eq!(a.chebyshev(Offset3::ZERO), 4);
}

#[test]
fn bounds_cube_and_contains() {
    let b = Bounds3::cube(Offset3::new(10, 0, -10), 2);
    assert_eq!(b.extent(), Offset3::new(5, 5, 5));
    assert!(b.contains(Offset3::new(12, 2, -8)));
    assert!(!b.contains(Offset3::new(13, 0, -10)));
    assert_eq!(b.levels(Axis::Y), -2..=2);
}

#[test]
fn bounds_from_points() {
    assert_eq!(Bounds3::from_points(std::iter::empty()), None);
    let b = Bounds3::from_points([
        Offset3::new(1, -1, 0),
        Offset3::new(-1, 0, 0),
        Offset3::new(0, 2, 4),
    ])
    .unwrap();
    assert_eq!(b.min, Offset3::new(-1, -1, 0));
    assert_eq!(b.max, Offset3::new(1, 2, 4));
    assert_eq!(b.translated(Offset3::new(1, 1, 1)).min, Offset3::new(0, 0, 1));
}

#[test]
fn rotation_full_turn_is_identity() {
    let v = Offset3::new(2, 1, -3);
    let r = Rotation::Cw90
        .compose(Rotation::Cw90)
        .compose(Rotation::Cw90)
        .compose(Rotation::Cw90);
    assert_eq!(r, Rotation::None);
    assert_eq!(Rotation::Cw180.apply(v), Offset3::new(-2, 1, 3));
    assert_eq!(Rotation::Cw270.inverse(), Rotation::Cw90);
}
