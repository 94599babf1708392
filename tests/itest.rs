// 集成测试
use sheetmerge::{get_num_from_ord, get_ord_from_num, get_ord_from_tuple, get_tuple_from_ord, MAX_COL_NUM};

#[test]
pub fn test_ord_to_num(){
    assert!(get_num_from_ord("B3".as_bytes()).unwrap() == 2);
    assert!(get_num_from_ord("Z".as_bytes()).unwrap() == 26);
    assert!(get_num_from_ord("AB".as_bytes()).unwrap() == 28);
    assert!(get_num_from_ord("xfd".as_bytes()).unwrap() == MAX_COL_NUM);
    assert!(get_num_from_ord("XFE".as_bytes()).is_err());

    assert!(get_ord_from_num(1).unwrap() == "A".to_string());
    assert!(get_ord_from_num(27).unwrap() == "AA".to_string());
    assert!(get_ord_from_num(37).unwrap() == "AK".to_string());
    assert!(get_ord_from_num(52).unwrap() == "AZ".to_string());
    assert!(get_ord_from_num(702).unwrap() == "ZZ".to_string());
    assert!(get_ord_from_num(703).unwrap() == "AAA".to_string());
    assert!(get_ord_from_num(0).is_err());

    assert!(get_tuple_from_ord("A1".as_bytes()).unwrap() == (1, 1));
    assert!(get_tuple_from_ord("B3".as_bytes()).unwrap() == (3, 2));
    assert!(get_tuple_from_ord("GW9".as_bytes()).unwrap() == (9, 205));
    assert!(get_tuple_from_ord("A".as_bytes()).is_err());
    assert!(get_tuple_from_ord("A0".as_bytes()).is_err());

    assert!(get_ord_from_tuple(9, 6).unwrap() == "F9");
}
