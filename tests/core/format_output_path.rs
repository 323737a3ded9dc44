//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use scrollharvest::core::format_output_path;

    #[test]
    fn as_is() {
        let final_destination =
            format_output_path("/home/username/Downloads/notes.csv", Some(""), "csv");

        assert_eq!(final_destination, "/home/username/Downloads/notes.csv");
    }

    #[test]
    fn substitute_profile() {
        let final_destination =
            format_output_path("/home/username/Downloads/%profile%.csv", Some("xhs"), "csv");

        assert_eq!(final_destination, "/home/username/Downloads/xhs.csv");
    }

    #[test]
    fn substitute_profile_multi() {
        let final_destination = format_output_path(
            "/home/username/Downloads/%profile%/%profile%.csv",
            Some("wechat-mp"),
            "csv",
        );

        assert_eq!(
            final_destination,
            "/home/username/Downloads/wechat-mp/wechat-mp.csv"
        );
    }

    #[test]
    fn sanitize() {
        let final_destination = format_output_path(
            r#"/home/username/Downloads/<>:"|?/%profile%.csv"#,
            Some(r#"/\<>:"|?"#),
            "csv",
        );

        assert_eq!(
            final_destination,
            r#"/home/username/Downloads/<>:"|?/__[] - -.csv"#
        );
    }

    #[test]
    fn level_up() {
        let final_destination = format_output_path("../%profile%.csv", Some(".hidden"), "csv");

        assert_eq!(final_destination, r#"../hidden.csv"#);
    }

    #[test]
    fn file_name_extension() {
        let final_destination = format_output_path("%profile%.%ext%", Some("douyin"), "tsv");

        assert_eq!(final_destination, r#"douyin.tsv"#);
    }

    #[test]
    fn date_is_iso_day() {
        let final_destination = format_output_path("export_%date%.csv", None, "csv");
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();

        assert!(final_destination.starts_with("export_20"));
        assert_eq!(final_destination.len(), "export_.csv".len() + today.len());
    }

    #[test]
    fn timestamp_has_no_colons() {
        let final_destination = format_output_path("%timestamp%", None, "csv");

        assert!(!final_destination.contains(':'));
        assert!(final_destination.ends_with('Z'));
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use scrollharvest::core::format_output_path;

    #[test]
    fn missing_profile_becomes_empty() {
        let final_destination = format_output_path("%profile%_list.csv", None, "csv");

        assert_eq!(final_destination, "_list.csv");
    }

    #[test]
    fn unknown_placeholder_is_kept() {
        let final_destination = format_output_path("%title%.csv", Some("xhs"), "csv");

        assert_eq!(final_destination, "%title%.csv");
    }
}
