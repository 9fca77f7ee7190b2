use super::*;

/// joins `lsof -F0` lines into the stream `lsof` would print.
fn stream(lines: &[&str]) -> Vec<u8> {
    lines.iter().flat_map(|l| l.bytes().chain([b'\n'])).collect()
}

const PID: Pid = Pid::from_raw(31415);

mod entry_parse_tests {
    use super::*;

    #[test]
    fn only_regular_numeric_descriptors() {
        const LINES: &[&str] = &[
            "p9784\0",
            "fcwd\0a \0i2\0",
            "frtd\0a \0i2\0",
            "ftxt\0a \0i760219\0",
            "fmem\0a \0i9183059\0",
            "fmem\0a \0i135483\0",
            "fmem\0a \0i134896\0",
            "f0\0a \0tREG\0o0t0\0i234381\0",
            "f1\0au\0tCHR\0o0t0\0i234381\0",
        ];
        for line in LINES {
            assert!(line.parse::<Entry>().is_err(), "{line:?} should be skipped");
        }

        let entry = "f10\0ar\0tREG\0s40382\0o0x2345a\0i5505713\0n/home/gus/Documents/test\0"
            .parse::<Entry>()
            .unwrap();
        assert_eq!(
            entry,
            Entry {
                fd: 10,
                inode: 5505713,
                offset: Some(0x2345a),
                size: Some(40382),
                name: Some("/home/gus/Documents/test".to_owned()),
                writable: false,
            }
        );
    }

    #[test]
    fn skip_reasons() {
        assert_eq!("p9784\0".parse::<Entry>(), Err(LineError::Process));
        assert_eq!(
            "fcwd\0a \0i2\0".parse::<Entry>(),
            Err(LineError::Descriptor("cwd".to_owned()))
        );
        assert_eq!(
            "f0\0a \0tREG\0o0t0\0i234381\0".parse::<Entry>(),
            Err(LineError::Access(" ".to_owned()))
        );
        assert_eq!(
            "f1\0au\0tCHR\0o0t0\0i234381\0".parse::<Entry>(),
            Err(LineError::Type("CHR".to_owned()))
        );
        assert_eq!(
            "f3\0ar\0k1\0i5\0".parse::<Entry>(),
            Err(LineError::UnknownField('k'))
        );
        assert_eq!("".parse::<Entry>(), Err(LineError::Missing("descriptor")));
        assert_eq!("f3\0ar\0".parse::<Entry>(), Err(LineError::Missing("inode")));
    }

    #[test]
    fn access_modes() {
        let writable = |line: &str| line.parse::<Entry>().unwrap().writable;
        assert!(!writable("f3\0ar\0i5\0"));
        assert!(writable("f3\0aw\0i5\0"));
        assert!(writable("f3\0au\0i5\0"));
    }

    #[test]
    fn offsets() {
        let offset = |line: &str| line.parse::<Entry>().unwrap().offset;
        assert_eq!(offset("f3\0o0x2345\0i5\0"), Some(0x2345));
        assert_eq!(offset("f3\0o0t58\0i5\0"), Some(58));
        assert_eq!(offset("f3\0o0\0i5\0"), Some(0));
        assert_eq!(offset("f3\0i5\0"), None);
        assert!(matches!(
            "f3\0o0xzz\0i5\0".parse::<Entry>(),
            Err(LineError::Value { label: "offset", .. })
        ));
    }

    #[test]
    fn no_descriptors() {
        assert_eq!(
            "fNOFD\0n/proc/1/fd (opendir: Permission denied)\0".parse::<Entry>(),
            Err(LineError::NoDescriptors)
        );
    }
}

mod stream_tests {
    use super::*;

    #[test]
    fn offsets_then_names() {
        let mut files = FileRegistry::new();

        let first = stream(&[
            "p31415\0",
            "fcwd\0a \0i2\0",
            "frtd\0a \0i2\0",
            "f2\0ar\0o0x2345\0i9876\0",
            "f10\0ar\0o0t58\0i452\0",
        ]);
        let stamp = Timestamp::new(5, 2345);
        assert_eq!(read_offsets(&first[..], PID, &mut files, stamp).unwrap(), 2);
        assert_eq!(files.len(), 2);
        let listed = files.iter().collect::<Vec<_>>();
        assert!(listed[0].seen);
        assert_eq!(listed[0].stamp, stamp);
        assert_eq!(listed[0].offset, 0x2345);
        assert!(listed[1].seen);
        assert_eq!(listed[1].stamp, stamp);
        assert_eq!(listed[1].offset, 58);

        let second = stream(&["f10\0ar\0o0x435678\0i452\0", "f11\0ar\0o0\0i1\0"]);
        let later = stamp + Timestamp::new(5, 0);
        assert_eq!(read_offsets(&second[..], PID, &mut files, later).unwrap(), 1);
        assert_eq!(files.len(), 3);
        let listed = files.iter().collect::<Vec<_>>();
        assert!(!listed[0].seen);
        assert_eq!(listed[0].stamp, stamp);
        assert!(listed[1].seen);
        assert_eq!(listed[1].stamp, later);
        assert_eq!(listed[1].offset, 0x435678);
        assert_eq!(listed[1].speed, (0x435678 - 58) as f64 / 5.0);
        assert!(listed[2].seen);
        assert_eq!(listed[2].stamp, later);

        let third = stream(&[
            "f10\0ar\0s1024\0i452\0n/path/to/nname10\0",
            "f2\0ar\0s123456\0i9876\0nrelative (on /raid)\0",
        ]);
        read_names(&third[..], PID, &mut files).unwrap();
        assert_eq!(files.len(), 3);
        let listed = files.iter().collect::<Vec<_>>();
        assert_eq!(listed[1].name, "/path/to/nname10");
        assert_eq!(listed[1].size, 1024);
        assert_eq!(listed[0].name, "relative (on /raid)");
        assert_eq!(listed[0].size, 123456);
        assert!(listed[2].name.is_empty());
    }

    #[test]
    fn unknown_files_are_not_named() {
        let mut files = FileRegistry::new();
        let names = stream(&["f4\0ar\0s10\0i7\0n/tmp/x\0"]);
        read_names(&names[..], PID, &mut files).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn writers_are_tracked() {
        let mut files = FileRegistry::new();
        let output = stream(&["f1\0aw\0tREG\0o0t4096\0i77\0"]);
        read_offsets(&output[..], PID, &mut files, Timestamp::new(1, 0)).unwrap();
        assert!(files.find(1, 77).unwrap().writable);
    }

    #[test]
    fn no_descriptors_is_a_failure() {
        let mut files = FileRegistry::new();
        let output = stream(&["p31415\0", "fNOFD\0n/proc/31415/fd\0", "f3\0ar\0o0\0i5\0"]);
        let err = read_offsets(&output[..], PID, &mut files, Timestamp::new(1, 0)).unwrap_err();
        assert!(matches!(err, SampleError::NoDescriptors { pid } if pid == PID));
    }
}
