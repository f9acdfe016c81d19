#[path = "../common/mod.rs"]
mod common;

#[cfg(test)]
mod tests {
    use super::common::sales_cube;
    use dicer::cell::{Cell, CellError, Cut, RollupSpec};
    use dicer::drilldown::{Drilldown, DrilldownError, DrilldownRequest};
    use dicer::model::ModelError;

    fn cell(s: &str) -> Cell {
        Cell::parse(s).unwrap()
    }

    #[test]
    fn test_slice_replaces_cut_of_same_dimension() {
        let base = cell("date:2010|store:7");
        let sliced = base.slice(Cut::point("date", &["2011"]));
        assert_eq!(sliced.to_string(), "date:2011|store:7");
        // The original cell is untouched.
        assert_eq!(base.to_string(), "date:2010|store:7");

        let added = base.slice(Cut::point("product", &["tea"]));
        assert_eq!(added.len(), 3);
    }

    #[test]
    fn test_multi_slice_and_point_slice() {
        let sliced = Cell::new().multi_slice(vec![
            Cut::point("date", &["2010"]),
            Cut::point("store", &["1"]),
            Cut::point("date", &["2012"]),
        ]);
        assert_eq!(sliced.to_string(), "date:2012|store:1");

        let cleared = sliced.point_slice::<&str>("date", &[]);
        assert_eq!(cleared.to_string(), "store:1");
    }

    #[test]
    fn test_drilldown_and_rollup() {
        let cube = sales_cube();
        let date = cube.dimension("date").unwrap();

        let drilled = cell("store:1|date:2010")
            .drilldown("date", "5", None)
            .unwrap();
        assert_eq!(drilled.to_string(), "store:1|date:2010,5");

        let up = drilled.rollup_dim(date, None, None).unwrap();
        assert_eq!(up.to_string(), "store:1|date:2010");

        let top = up.rollup_dim(date, None, None).unwrap();
        assert_eq!(top.to_string(), "store:1");
    }

    #[test]
    fn test_rollup_to_level() {
        let cube = sales_cube();
        let rolled = cell("date:2010,5,17|product:tea,green")
            .rollup(
                &RollupSpec::Levels(vec![("date".into(), "year".into())]),
                &cube,
            )
            .unwrap();
        assert_eq!(rolled.to_string(), "date:2010|product:tea,green");

        let err = cell("date:2010")
            .rollup(
                &RollupSpec::Levels(vec![("date".into(), "day".into())]),
                &cube,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CellError::Model(ModelError::RollupTooDeep { .. })
        ));
    }

    #[test]
    fn test_rollup_rejects_set_cut() {
        let cube = sales_cube();
        let err = cell("date:2010;2011")
            .rollup(&RollupSpec::Dimension("date".into()), &cube)
            .unwrap_err();
        assert!(matches!(err, CellError::UnsupportedCut { kind: "set", .. }));
    }

    #[test]
    fn test_drilldown_rejects_range_cut() {
        let err = cell("date:2010-2012").drilldown("date", "5", None).unwrap_err();
        assert!(matches!(err, CellError::UnsupportedCut { kind: "range", .. }));
    }

    #[test]
    fn test_conjunction_and_public_cell() {
        let hidden = Cell::from_cuts(vec![Cut::point("store", &["1"]).hidden(true)]);
        let both = &cell("date:2010") & &hidden;
        assert_eq!(both.len(), 2);
        assert_eq!(both.public_cell().to_string(), "date:2010");
    }

    #[test]
    fn test_level_depths_and_contains_level() {
        let cube = sales_cube();
        let c = cell("date:2010,5|product:tea;coffee,arabica|customer:1-9");

        let depths = c.level_depths();
        assert_eq!(depths["date"], 2);
        assert_eq!(depths["product"], 2);

        assert!(c.contains_level(&cube, "date", "month", None).unwrap());
        assert!(!c.contains_level(&cube, "date", "day", None).unwrap());
        assert!(c.contains_level(&cube, "product", "name", None).unwrap());
        // Ranges never pin a level.
        assert!(!c.contains_level(&cube, "customer", "customer_id", None).unwrap());
    }

    #[test]
    fn test_implicit_drilldown_level() {
        let cube = sales_cube();
        let c = cell("date:2010");
        let drilldown = Drilldown::new(&[DrilldownRequest::new("date")], &cube, &c).unwrap();

        let item = drilldown.item("date").unwrap();
        assert_eq!(item.deepest_level().unwrap().name, "month");
        assert_eq!(drilldown.items_as_strings(), vec!["date:month"]);
    }

    #[test]
    fn test_drilldown_past_last_level() {
        let cube = sales_cube();
        let err = Drilldown::parse(&["date"], &cube, &cell("date:2010,5,17")).unwrap_err();
        assert!(matches!(
            err,
            DrilldownError::Model(ModelError::DrilldownTooDeep { .. })
        ));
    }

    #[test]
    fn test_duplicate_drilldown_dimension() {
        let cube = sales_cube();
        let err = Drilldown::parse(&["date:year", "date:month"], &cube, &Cell::new()).unwrap_err();
        assert_eq!(err, DrilldownError::DuplicateDimension("date".into()));
    }
}
