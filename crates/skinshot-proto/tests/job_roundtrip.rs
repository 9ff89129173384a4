use skinshot_proto::{Profile, Property, RenderJob, RenderMode, ResponseFrame};
use uuid::Uuid;

fn job_with(props: usize, params: usize) -> RenderJob {
    let mut profile = Profile::new(Uuid::from_u64_pair(0xdead_beef, props as u64), "Dinnerbone");
    for i in 0..props {
        let p = if i % 2 == 0 {
            Property::signed(format!("k{i}"), format!("v{i}"), format!("s{i}"))
        } else {
            Property::new(format!("k{i}"), format!("v{i}"))
        };
        profile = profile.with_property(p);
    }

    let mut job = RenderJob::new(RenderMode::Bust, 300, 600, 3, (0..=255u8).collect())
        .with_profile(profile);
    for i in 0..params {
        job = job.with_param(format!("p{i}"), (0..i).map(|j| format!("{i}.{j}")).collect());
    }
    job
}

#[test]
fn jobs_roundtrip_across_property_and_param_counts() {
    for props in [0, 1, 2, 7] {
        for params in [0, 1, 3, 9] {
            let job = job_with(props, params);
            let body = job.encode().expect("encode");
            let back = RenderJob::decode(&body).expect("decode");
            assert_eq!(back, job, "props={props} params={params}");
        }
    }
}

#[test]
fn every_mode_roundtrips() {
    for mode in RenderMode::ALL {
        let job = RenderJob::new(mode, 1, 1, 1, vec![]);
        assert_eq!(RenderJob::decode(&job.encode().unwrap()).unwrap().mode, mode);
    }
}

#[test]
fn response_payload_runs_to_end_of_body() {
    let png = vec![0x89, b'P', b'N', b'G', 0, 0, 0, 0];
    let body = ResponseFrame::success("worker #1", png.clone()).encode().unwrap();
    let frame = ResponseFrame::decode(&body).unwrap();
    assert_eq!(frame.worker, "worker #1");
    assert_eq!(frame.payload, png);
}
