use super::*;
use crate::family::Requirement;
use enum_iterator::all;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn stripe_data(k: usize, len: usize, seed: u32) -> Vec<Vec<u8>> {
    let mut state = seed;
    (0..k)
        .map(|_| {
            (0..len)
                .map(|_| {
                    state = state.wrapping_mul(1103515245).wrapping_add(12345);
                    (state >> 16) as u8
                })
                .collect()
        })
        .collect()
}

/// A few valid parameter sets per family.
fn parameter_sets(family: CodeFamily) -> Vec<CodeParameters> {
    let p = |k, m, w, packet_size| CodeParameters::new(k, m, w, packet_size, 0);
    match family {
        CodeFamily::Vandermonde => vec![p(4, 2, 8, 0), p(5, 3, 16, 0), p(3, 3, 32, 0), p(6, 1, 8, 0)],
        CodeFamily::CauchyOriginal => vec![p(4, 2, 4, 8), p(3, 3, 3, 8), p(5, 2, 8, 4), p(4, 3, 5, 2)],
        CodeFamily::CauchyGood => vec![p(4, 2, 4, 8), p(3, 3, 3, 8), p(6, 3, 4, 4), p(3, 2, 17, 1)],
        CodeFamily::Liberation => vec![p(3, 2, 3, 8), p(5, 2, 5, 8), p(4, 2, 7, 16)],
        CodeFamily::BlaumRoth => vec![p(4, 2, 4, 8), p(6, 2, 6, 8), p(2, 2, 10, 8)],
        CodeFamily::Liber8tion => vec![p(8, 2, 8, 8), p(3, 2, 8, 4)],
    }
}

/// All subsets of `0..n` with at most `max` elements.
fn erasure_sets(n: usize, max: usize) -> Vec<Vec<usize>> {
    let mut sets = vec![vec![]];
    for i in 0..n {
        let extended: Vec<Vec<usize>> = sets
            .iter()
            .filter(|s| s.len() < max)
            .map(|s| {
                let mut s = s.clone();
                s.push(i);
                s
            })
            .collect();
        sets.extend(extended);
    }
    sets
}

fn clobber(data: &mut [Vec<u8>], coding: &mut [Vec<u8>], erased: &[usize]) {
    let k = data.len();
    for i in erased {
        let buf = if *i < k { &mut data[*i] } else { &mut coding[*i - k] };
        buf.fill(0xee);
    }
}

#[test]
fn test_scenario_vandermonde() {
    let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(4, 2, 8, 0, 8)).unwrap();
    let data: Vec<Vec<u8>> = [b"erasure!", b"coding::", b"galois<>", b"stripe42"]
        .iter()
        .map(|d| d.to_vec())
        .collect();
    let coding = code.encode(&data).unwrap();
    assert_eq!(
        coding,
        vec![
            vec![18, 8, 27, 28, 2, 3, 87, 23],
            vec![28, 67, 159, 31, 9, 134, 222, 19]
        ]
    );

    let (mut d, mut c) = (data.clone(), coding.clone());
    clobber(&mut d, &mut c, &[2, 5]);
    code.decode(&mut d, &mut c, &Erasures::from(vec![5, 2])).unwrap();
    assert_eq!(d, data);
    assert_eq!(c, coding);
}

#[test]
fn test_vandermonde_matrix_exposed() {
    let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(4, 2, 8, 0, 0)).unwrap();
    let matrix = code.matrix().unwrap();
    assert_eq!(matrix.row(1), &[1, 70, 143, 200]);
    assert!(code.bitmatrix().is_none());
    assert!(code.schedule().is_none());
    assert_eq!(matrix.to_string(), "  1   1   1   1\n  1  70 143 200\n");
}

#[test]
fn test_recover_every_pattern() {
    for family in all::<CodeFamily>() {
        for params in parameter_sets(family) {
            let code = Code::new(family, params).unwrap();
            let len = code.block_unit() * 3;
            let data = stripe_data(params.k, len, 0xdead_beef);
            let coding = code.encode(&data).unwrap();

            for erased in erasure_sets(params.k + params.m, params.m) {
                let (mut d, mut c) = (data.clone(), coding.clone());
                clobber(&mut d, &mut c, &erased);
                code.decode(&mut d, &mut c, &Erasures::from(erased.clone()))
                    .unwrap_or_else(|e| panic!("{} {}: {:?}: {}", family, params, erased, e));
                assert!(d == data && c == coding, "{} {} erased {:?}", family, params, erased);
            }
        }
    }
}

#[test]
fn test_cauchy_in_smallest_fields() {
    // in GF(2) the element x reduces to 1, so bit blocks are 1 x 1
    let p = |k, m, w| CodeParameters::new(k, m, w, 8, 0);
    for family in [CodeFamily::CauchyOriginal, CodeFamily::CauchyGood] {
        for params in [p(1, 1, 1), p(2, 2, 2), p(3, 1, 2), p(1, 3, 2)] {
            let code = Code::new(family, params)
                .unwrap_or_else(|e| panic!("{} {}: {}", family, params, e));
            let bitmatrix = code.bitmatrix().unwrap();
            assert_eq!(bitmatrix.rows(), params.m * params.w);
            let data = stripe_data(params.k, code.block_unit() * 2, 99);
            let coding = code.encode(&data).unwrap();

            for erased in erasure_sets(params.k + params.m, params.m) {
                let (mut d, mut c) = (data.clone(), coding.clone());
                clobber(&mut d, &mut c, &erased);
                code.decode(&mut d, &mut c, &Erasures::from(erased.clone())).unwrap();
                assert!(d == data && c == coding, "{} {} erased {:?}", family, params, erased);
            }
        }
    }
    // with one data block in GF(2) the code is a mirror
    let code = Code::new(CodeFamily::CauchyOriginal, p(1, 1, 1)).unwrap();
    let data = stripe_data(1, 16, 5);
    assert_eq!(code.encode(&data).unwrap(), data);
}

#[test]
fn test_xor_codes_match_their_bitmatrix() {
    // the Cauchy schedule computes the same as field arithmetic on the words
    let params = CodeParameters::new(4, 2, 8, 1, 0);
    let cauchy = Code::new(CodeFamily::CauchyOriginal, params).unwrap();
    let data = stripe_data(4, 8, 7);
    let coding = cauchy.encode(&data).unwrap();

    let field = Field::new(8).unwrap();
    let matrix = cauchy.matrix().unwrap();
    for (i, block) in coding.iter().enumerate() {
        // with packet_size 1 byte b of a block holds bit b of one word
        let word = |buf: &[u8]| (0..8).fold(0u32, |acc, b| acc | (u32::from(buf[b] & 1) << b));
        let expected = (0..4).fold(0, |acc, j| acc ^ field.multiply(matrix.coefficient(j, i), word(&data[j])));
        assert_eq!(word(block), expected);
    }
}

#[test]
fn test_too_many_erasures() {
    let code = Code::new(CodeFamily::Liberation, CodeParameters::new(3, 2, 3, 8, 0)).unwrap();
    let data = stripe_data(3, 48, 1);
    let coding = code.encode(&data).unwrap();
    let (mut d, mut c) = (data.clone(), coding.clone());
    assert_eq!(
        code.decode(&mut d, &mut c, &Erasures::from(vec![0, 1, 4])),
        Err(Error::TooManyErasures {
            k: 3,
            m: 2,
            erased: vec![0, 1, 4]
        })
    );
    assert_eq!((d, c), (data, coding));
}

#[test]
fn test_no_erasures_is_a_noop() {
    let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(3, 2, 16, 0, 0)).unwrap();
    let mut data = stripe_data(3, 10, 2);
    // even the coding blocks are not looked at
    let mut coding = vec![vec![0xaa; 10]; 2];
    code.decode(&mut data, &mut coding, &Erasures::new()).unwrap();
    assert_eq!(data, stripe_data(3, 10, 2));
    assert_eq!(coding, vec![vec![0xaa; 10]; 2]);

    let plan = code.plan(&Erasures::from_terminated(&[-1]).unwrap()).unwrap();
    assert!(plan.is_empty());
    code.decode_with(&plan, &mut data, &mut coding).unwrap();
    assert_eq!(coding, vec![vec![0xaa; 10]; 2]);
}

#[test]
fn test_encode_is_deterministic() {
    for family in all::<CodeFamily>() {
        let params = parameter_sets(family)[0];
        let code = Code::new(family, params).unwrap();
        let data = stripe_data(params.k, code.block_unit() * 2, 3);
        let first = code.encode(&data).unwrap();
        let mut again = vec![vec![0x5a; data[0].len()]; params.m];
        code.encode_into(&data, &mut again).unwrap();
        assert_eq!(first, again, "{}", family);
    }
}

#[test]
fn test_plan_replay_and_mismatch() {
    let params = CodeParameters::new(4, 2, 4, 8, 0);
    let code = Code::new(CodeFamily::CauchyGood, params).unwrap();
    let plan = code.plan(&Erasures::from(vec![4, 1])).unwrap();
    assert_eq!(plan.erased(), &[1, 4]);
    assert!(plan.schedule().is_some());

    for seed in 0..3 {
        let data = stripe_data(4, 64, seed);
        let coding = code.encode(&data).unwrap();
        let (mut d, mut c) = (data.clone(), coding.clone());
        clobber(&mut d, &mut c, &[1, 4]);
        code.decode_with(&plan, &mut d, &mut c).unwrap();
        assert_eq!((d, c), (data, coding));
    }

    let other = Code::new(CodeFamily::CauchyOriginal, params).unwrap();
    let mut d = stripe_data(4, 64, 0);
    let mut c = other.encode(&d).unwrap();
    assert_eq!(other.decode_with(&plan, &mut d, &mut c), Err(Error::PlanMismatch));
}

#[test]
fn test_parity_shortcut() {
    let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(5, 3, 8, 0, 0)).unwrap();
    // one lost data block: XOR of coding block 0 and the other four
    let plan = code.plan(&Erasures::from(vec![2])).unwrap();
    assert_eq!(plan.cost(), 5);
    assert!(plan.schedule().is_none());

    // coding block 0 lost as well: needs the inverse
    let data = stripe_data(5, 16, 9);
    let coding = code.encode(&data).unwrap();
    for erased in [vec![2, 5], vec![0, 2, 5], vec![0, 4]] {
        let (mut d, mut c) = (data.clone(), coding.clone());
        clobber(&mut d, &mut c, &erased);
        code.decode(&mut d, &mut c, &Erasures::from(erased)).unwrap();
        assert_eq!((d, c), (data.clone(), coding.clone()));
    }
}

#[test]
fn test_invalid_erasure_sets() {
    let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(4, 2, 8, 0, 0)).unwrap();
    let mut data = stripe_data(4, 8, 4);
    let mut coding = code.encode(&data).unwrap();
    for erased in [vec![6], vec![1, 1]] {
        assert!(matches!(
            code.decode(&mut data, &mut coding, &Erasures::from(erased)),
            Err(Error::InvalidErasureSet { .. })
        ));
    }
}

#[test]
fn test_invalid_buffers() {
    let code = Code::new(CodeFamily::Liber8tion, CodeParameters::new(3, 2, 8, 4, 64)).unwrap();
    let data = stripe_data(3, 64, 5);
    assert!(code.encode(&data).is_ok());

    let invalid = |r: Result<Vec<Vec<u8>>>| matches!(r, Err(Error::InvalidBuffers { .. }));
    // count
    assert!(invalid(code.encode(&data[..2])));
    // length differs from buffer_size
    assert!(invalid(code.encode(&stripe_data(3, 32, 5))));
    // lengths differ
    let mut uneven = data.clone();
    uneven[1].push(0);
    assert!(invalid(code.encode(&uneven)));

    // not a multiple of packet_size * w
    let code = Code::new(CodeFamily::Liber8tion, CodeParameters::new(3, 2, 8, 4, 0)).unwrap();
    assert!(invalid(code.encode(&stripe_data(3, 40, 5))));
    let mut coding = vec![vec![0; 32]; 1];
    assert!(matches!(
        code.encode_into(&stripe_data(3, 32, 5), &mut coding),
        Err(Error::InvalidBuffers { .. })
    ));

    // words of w = 16 are two bytes
    let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(2, 1, 16, 0, 0)).unwrap();
    assert!(invalid(code.encode(&stripe_data(2, 7, 5))));
}

#[test]
fn test_family_constraints() {
    let rejected = |family, params| {
        matches!(
            Code::new(family, params),
            Err(Error::InvalidCodeParameters { .. })
        )
    };
    assert!(rejected(CodeFamily::Liberation, CodeParameters::new(4, 2, 4, 8, 0)));
    assert!(rejected(CodeFamily::Liberation, CodeParameters::new(10, 2, 7, 8, 0)));
    assert!(rejected(CodeFamily::Liber8tion, CodeParameters::new(4, 2, 7, 8, 0)));
    assert!(rejected(CodeFamily::CauchyOriginal, CodeParameters::new(4, 2, 8, 0, 0)));
    assert!(rejected(CodeFamily::CauchyGood, CodeParameters::new(4, 2, 8, 0, 0)));
    assert!(CodeFamily::Liber8tion.requirements().contains(Requirement::WidthEight));
}

#[test]
fn test_describe_and_compatibility() {
    let params = CodeParameters::new(4, 2, 8, 0, 0);
    let code = Code::new(CodeFamily::Vandermonde, params).unwrap();
    assert_eq!(code.describe(), params);
    assert_eq!(code.describe().to_string(), "k=4 m=2 w=8 packet_size=0 buffer_size=0");
    assert_eq!(
        code.check_compatibility(1_000_000).map(|l| l.buffer_size),
        Ok(1_000_000)
    );
}

#[test]
fn test_smart_schedule_is_used() {
    for family in [CodeFamily::CauchyOriginal, CodeFamily::CauchyGood] {
        let code = Code::new(family, CodeParameters::new(5, 3, 8, 8, 0)).unwrap();
        let bitmatrix = code.bitmatrix().unwrap();
        assert_eq!(code.schedule().unwrap(), &Schedule::smart(bitmatrix));
        assert!(code.schedule().unwrap().len() <= Schedule::dumb(bitmatrix).len());
    }
    let original = Code::new(CodeFamily::CauchyOriginal, CodeParameters::new(5, 2, 8, 8, 0)).unwrap();
    let good = Code::new(CodeFamily::CauchyGood, CodeParameters::new(5, 2, 8, 8, 0)).unwrap();
    assert!(good.schedule().unwrap().len() < original.schedule().unwrap().len());
}

#[test]
fn test_shared_between_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Code>();
    assert_send_sync::<DecodePlan>();

    let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(6, 3, 8, 0, 0)).unwrap();
    let plan = code.plan(&Erasures::from(vec![0, 3, 7])).unwrap();
    std::thread::scope(|s| {
        for seed in 0..4 {
            let (code, plan) = (&code, &plan);
            s.spawn(move || {
                let data = stripe_data(6, 256, seed);
                let coding = code.encode(&data).unwrap();
                let (mut d, mut c) = (data.clone(), coding.clone());
                clobber(&mut d, &mut c, &[0, 3, 7]);
                code.decode_with(plan, &mut d, &mut c).unwrap();
                assert_eq!((d, c), (data, coding));
            });
        }
    });
}

fn arb_erasures(n: usize, max: usize) -> impl Strategy<Value = Vec<usize>> {
    proptest::sample::subsequence((0..n).collect::<Vec<_>>(), 0..=max).prop_shuffle()
}

proptest! {
    #[test]
    fn prop_vandermonde_recovers(
        seed in any::<u32>(),
        words in 1usize..16,
        erased in arb_erasures(7, 3),
    ) {
        let code = Code::new(CodeFamily::Vandermonde, CodeParameters::new(4, 3, 16, 0, 0)).unwrap();
        let data = stripe_data(4, words * 2, seed);
        let coding = code.encode(&data).unwrap();
        let (mut d, mut c) = (data.clone(), coding.clone());
        clobber(&mut d, &mut c, &erased);
        code.decode(&mut d, &mut c, &Erasures::from(erased)).unwrap();
        prop_assert_eq!(d, data);
        prop_assert_eq!(c, coding);
    }

    #[test]
    fn prop_cauchy_good_recovers(
        seed in any::<u32>(),
        groups in 1usize..4,
        erased in arb_erasures(8, 3),
    ) {
        let code = Code::new(CodeFamily::CauchyGood, CodeParameters::new(5, 3, 4, 8, 0)).unwrap();
        let data = stripe_data(5, groups * 32, seed);
        let coding = code.encode(&data).unwrap();
        let (mut d, mut c) = (data.clone(), coding.clone());
        clobber(&mut d, &mut c, &erased);
        code.decode(&mut d, &mut c, &Erasures::from(erased)).unwrap();
        prop_assert_eq!(d, data);
        prop_assert_eq!(c, coding);
    }

    #[test]
    fn prop_terminated_roundtrip(erased in arb_erasures(12, 4)) {
        let erasures = Erasures::from(erased.clone());
        let parsed = Erasures::from_terminated(&erasures.to_terminated().unwrap()).unwrap();
        prop_assert_eq!(parsed.as_slice(), &erased[..]);
    }
}
