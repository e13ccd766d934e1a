use clap::Parser;
use proptest::prelude::*;
use qmictl::cli::args::Args;
use qmictl::core::protocol::Service;

/// Action flags with a valid value where one is required.
const ACTIONS: &[(&str, Option<&str>, Service)] = &[
    ("--get-service-version-info", None, Service::Ctl),
    ("--device-set-instance-id", Some("3"), Service::Ctl),
    ("--dms-get-ids", None, Service::Dms),
    ("--dms-set-operating-mode", Some("low-power"), Service::Dms),
    ("--dms-noop", None, Service::Dms),
    ("--nas-get-home-network", None, Service::Nas),
    ("--nas-get-tx-rx-info", Some("lte"), Service::Nas),
    ("--nas-network-scan", None, Service::Nas),
    ("--wds-stop-network", Some("1"), Service::Wds),
    ("--wds-get-profile-list", Some("3gpp"), Service::Wds),
    ("--wds-get-packet-service-status", None, Service::Wds),
    ("--pbm-get-all-capabilities", None, Service::Pbm),
    ("--uim-read-transparent", Some("0x3F00,0x2FE2"), Service::Uim),
    ("--uim-noop", None, Service::Uim),
];

fn argv(selected: &[usize]) -> Vec<String> {
    let mut argv = vec!["qmictl".to_string(), "-d".to_string(), "/dev/cdc-wdm0".to_string()];
    for &index in selected {
        let (flag, value, _) = ACTIONS[index];
        argv.push(flag.to_string());
        if let Some(value) = value {
            argv.push(value.to_string());
        }
    }
    argv
}

proptest! {
    #[test]
    fn exactly_one_action_is_accepted(
        selected in proptest::sample::subsequence((0..ACTIONS.len()).collect::<Vec<_>>(), 0..=4)
    ) {
        let args = Args::try_parse_from(argv(&selected)).unwrap();
        let result = args.invocation(None);

        match selected.len() {
            0 => {
                let err = result.unwrap_err();
                prop_assert!(err.is_configuration());
                prop_assert_eq!(err.headline(), "no actions specified");
            }
            1 => {
                let invocation = result.unwrap();
                prop_assert_eq!(invocation.action.service(), ACTIONS[selected[0]].2);
            }
            _ => {
                let err = result.unwrap_err();
                prop_assert!(err.is_configuration());

                let first = ACTIONS[selected[0]].2;
                let same_service = selected.iter().all(|&i| ACTIONS[i].2 == first);
                if same_service {
                    prop_assert!(err.headline().starts_with("too many"));
                } else {
                    let headline = err.headline();
                    prop_assert!(
                        headline.starts_with("too many")
                            || headline == "cannot execute multiple actions of different services"
                    );
                }
            }
        }
    }

    #[test]
    fn bad_cid_is_rejected(cid in "[a-z]{1,6}") {
        let args = Args::try_parse_from([
            "qmictl", "-d", "/dev/cdc-wdm0", "--client-cid", cid.as_str(), "--dms-noop",
        ])
        .unwrap();
        let err = args.invocation(None).unwrap_err();
        prop_assert!(err.is_configuration());
        prop_assert!(err.headline().starts_with("invalid cid given"));
    }
}
