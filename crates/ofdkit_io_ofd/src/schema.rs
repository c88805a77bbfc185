//! OFD field schema registry.
//!
//! The table is process-wide, read-only data. Lookups are linear over a
//! const slice; conversions resolve each column once, not per cell.

use crate::spec::EnumFieldTypeClass::{self, Character, DigitString, Numeric};
use crate::spec::{OfdError, SpecFieldSpec};

const fn field(
    canonical_name: &'static str,
    identifier: &'static str,
    type_class: EnumFieldTypeClass,
    byte_length: usize,
    decimal_places: usize,
) -> SpecFieldSpec {
    SpecFieldSpec {
        canonical_name,
        identifier,
        type_class,
        byte_length,
        decimal_places,
    }
}

/// Every canonical OFD field, in directory order.
pub static TUP_OFD_FIELD_SCHEMA: &[SpecFieldSpec] = &[
    field("通讯地址", "Address", Character, 300, 0),
    field("法人代表身份证件代码", "InstReprIDCode", Character, 40, 0),
    field("法人代表证件类型", "InstReprIDType", Character, 3, 0),
    field("法人代表姓名", "InstReprName", Character, 60, 0),
    field("申请单编号", "AppSheetSerialNo", Character, 24, 0),
    field("个人证件类型及机构证件型", "CertificateType", Character, 3, 0),
    field("投资人证件号码", "CertificateNo", Character, 40, 0),
    field("投资人户名", "InvestorName", Character, 200, 0),
    field("交易发生日期", "TransactionDate", DigitString, 8, 0),
    field("交易发生时间", "TransactionTime", DigitString, 6, 0),
    field("个人/机构标志", "IndividualOrInstitution", DigitString, 1, 0),
    field("投资人邮政编码", "PostCode", DigitString, 6, 0),
    field("经办人证件号码", "TransactorCertNo", Character, 40, 0),
    field("经办人证件类型", "TransactorCertType", Character, 3, 0),
    field("经办人姓名", "TransactorName", Character, 60, 0),
    field("投资人基金交易帐号", "TransactionAccountID", Character, 17, 0),
    field("销售人代码", "DistributorCode", Character, 9, 0),
    field("业务代码", "BusinessCode", Character, 3, 0),
    field("基金管理人在资金清算机构的交收帐号", "AcctNoOfFMInClearingAgency", Character, 28, 0),
    field("基金管理人在资金清算机构的交收账户名", "AcctNameOfFMInClearingAgency", Character, 60, 0),
    field("基金资金清算机构代码", "ClearingAgencyCode", DigitString, 9, 0),
    field("投资人出生日期", "InvestorsBirthday", DigitString, 8, 0),
    field("投资人在销售人处用于交易的资金帐号", "DepositAcct", Character, 40, 0),
    field("交易所在地区编号", "RegionCode", DigitString, 4, 0),
    field("投资人学历", "EducationLevel", Character, 3, 0),
    field("投资人E-MAIL地址", "EmailAddress", Character, 40, 0),
    field("投资人传真号码", "FaxNo", Character, 40, 0),
    field("投资人职业代码", "VocationCode", Character, 5, 0),
    field("投资人住址电话", "HomeTelNo", Character, 40, 0),
    field("投资人年收入", "AnnualIncome", Numeric, 16, 0),
    field("投资人手机号码", "MobileTelNo", Character, 40, 0),
    field("网点号码", "BranchCode", Character, 9, 0),
    field("投资人单位电话号码", "OfficeTelNo", Character, 40, 0),
    field("投资人户名简称", "AccountAbbr", Character, 20, 0),
    field("密函编号", "ConfidentialDocumentCode", Character, 8, 0),
    field("投资人性别", "Sex", DigitString, 1, 0),
    field("上海证券帐号", "SHSecuritiesAccountID", Character, 10, 0),
    field("深圳证券帐号", "SZSecuritiesAccountID", Character, 10, 0),
    field("投资人基金帐号", "TAAccountID", Character, 12, 0),
    field("投资人电话号码", "TelNo", Character, 40, 0),
    field("使用的交易手段", "TradingMethod", Character, 8, 0),
    field("未成年人标志", "MinorFlag", Character, 1, 0),
    field("对帐单寄送选择", "DeliverType", Character, 1, 0),
    field("经办人识别方式", "TransactorIDType", Character, 1, 0),
    field("基金账户卡的凭证号", "AccountCardID", Character, 8, 0),
    field("多渠道开户标志", "MultiAcctFlag", DigitString, 1, 0),
    field("对方销售人处投资人基金交易帐号", "TargetTransactionAccountID", Character, 17, 0),
    field("投资人收款银行账户户名", "AcctNameOfInvestorInClearingAgency", Character, 200, 0),
    field("投资人收款银行账户账号", "AcctNoOfInvestorInClearingAgency", Character, 40, 0),
    field("投资人收款银行账户开户行", "ClearingAgency", Character, 20, 0),
    field("对帐单寄送方式", "DeliverWay", Character, 8, 0),
    field("投资者国家或地区", "Nationality", Character, 3, 0),
    field("操作（清算）网点编号", "NetNo", Character, 9, 0),
    field("经纪人", "Broker", Character, 12, 0),
    field("工作单位名称", "CorpName", Character, 200, 0),
    field("证件有效日期", "CertValidDate", DigitString, 8, 0),
    field("机构经办人身份证件有效日期", "InstTranCertValidDate", DigitString, 8, 0),
    field("机构法人身份证件有效日期", "InstReprCertValidDate", DigitString, 8, 0),
    field("客户风险等级", "ClientRiskRate", Character, 1, 0),
    field("婚姻状况", "MarriageStatus", Character, 1, 0),
    field("家庭人口数", "FamilyNum", Numeric, 2, 0),
    field("家庭资产", "Penates", Numeric, 16, 2),
    field("媒体偏好", "MediaHobby", Character, 1, 0),
    field("机构类型", "InstitutionType", Character, 3, 0),
    field("投资人英文名", "EnglishFirstName", Character, 20, 0),
    field("投资人英文姓", "EnglishFamliyName", Character, 20, 0),
    field("行业", "Vocation", Character, 4, 0),
    field("企业性质", "CorpoProperty", Character, 2, 0),
    field("员工人数", "StaffNum", Numeric, 16, 2),
    field("兴趣爱好类型", "Hobbytype", Character, 2, 0),
    field("省/直辖市", "Province", Character, 6, 0),
    field("市", "City", Character, 6, 0),
    field("县/区", "County", Character, 6, 0),
    field("推荐人", "CommendPerson", Character, 40, 0),
    field("推荐人类型", "CommendPersonType", Character, 1, 0),
    field("受理方式", "AcceptMethod", Character, 1, 0),
    field("冻结原因", "FrozenCause", DigitString, 1, 0),
    field("冻结截止日期", "FreezingDeadline", DigitString, 8, 0),
    field("TA的原确认流水号", "OriginalSerialNo", Character, 20, 0),
    field("原申请单编号", "OriginalAppSheetNo", Character, 24, 0),
    field("摘要/说明", "Specification", Character, 60, 0),
    field("投资者产品代码", "InvestorProCode", Character, 30, 0),
    field("辅助身份证明文件类型", "AuxCertType", Character, 3, 0),
    field("辅助身份证明文件号码", "AuxCertCode", Character, 40, 0),
    field("辅助身份证明文件有效日期", "AuxCertValidDate", Character, 8, 0),
    field("IP地址", "IPAddress", Character, 40, 0),
    field("MAC地址", "MACAddress", Character, 20, 0),
    field("国际移动设备识别码", "IMEI", Character, 20, 0),
    field("通用唯一识别码", "UUID", Character, 32, 0),
    field("基金代码", "FundCode", Character, 6, 0),
    field("巨额赎回处理标志", "LargeRedemptionFlag", DigitString, 1, 0),
    field("申请基金份数", "ApplicationVol", Numeric, 16, 2),
    field("申请金额", "ApplicationAmount", Numeric, 16, 2),
    field("销售佣金折扣率", "DiscountRateOfCommission", Numeric, 5, 4),
    field("结算币种", "CurrencyType", DigitString, 3, 0),
    field("原申购日期", "OriginalSubsDate", DigitString, 8, 0),
    field("交易申请有效天数", "ValidPeriod", Numeric, 2, 0),
    field("预约赎回工作日天数", "DaysRedemptionInAdvance", Numeric, 5, 0),
    field("预约赎回日期", "RedemptionDateInAdvance", DigitString, 8, 0),
    field("定期定额申购日期", "DateOfPeriodicSubs", DigitString, 8, 0),
    field("TA确认交易流水号", "TASerialNO", Character, 20, 0),
    field("定期定额申购期限", "TermOfPeriodicSubs", Numeric, 5, 0),
    field("指定申购日期", "FutureBuyDate", DigitString, 8, 0),
    field("对方销售人代码", "TargetDistributorCode", Character, 9, 0),
    field("手续费", "Charge", Numeric, 16, 2),
    field("对方网点号", "TargetBranchCode", Character, 9, 0),
    field("对方所在地区编号", "TargetRegionCode", DigitString, 4, 0),
    field("红利比例", "DividendRatio", Numeric, 16, 2),
    field("转换时的目标基金代码", "CodeOfTargetFund", Character, 6, 0),
    field("交易后端收费总额", "TotalBackendLoad", Numeric, 16, 2),
    field("收费类别", "ShareClass", Character, 1, 0),
    field("TA的原确认日期", "OriginalCfmDate", DigitString, 8, 0),
    field("明细标志", "DetailFlag", Character, 1, 0),
    field("原申请日期", "OriginalAppDate", DigitString, 8, 0),
    field("默认分红方式", "DefDividendMethod", DigitString, 1, 0),
    field("定时定额品种代码", "VarietyCodeOfPeriodicSubs", Character, 5, 0),
    field("定时定额申购序号", "SerialNoOfPeriodicSubs", Character, 5, 0),
    field("定期定额种类", "RationType", Character, 1, 0),
    field("对方基金账号", "TargetTAAccountID", Character, 12, 0),
    field("对方TA代码", "TargetRegistrarCode", Character, 18, 0),
    field("TA客户编号", "CustomerNo", Character, 12, 0),
    field("对方基金份额类别", "TargetShareType", Character, 1, 0),
    field("定期定额协议号", "RationProtocolNo", Character, 20, 0),
    field("定时定额申购起始日期", "BeginDateOfPeriodicSubs", DigitString, 8, 0),
    field("定时定额申购终止日期", "EndDateOfPeriodicSubs", DigitString, 8, 0),
    field("定时定额申购每月发送日", "SendDayOfPeriodicSubs", Numeric, 2, 0),
    field("促销活动代码", "SalesPromotion", Character, 3, 0),
    field("强制赎回类型", "ForceRedemptionType", Character, 1, 0),
    field("带走收益标志", "TakeIncomeFlag", Character, 1, 0),
    field("定投目的", "PurposeOfPeSubs", Character, 40, 0),
    field("定投频率", "FrequencyOfPeSubs", Numeric, 5, 0),
    field("定投周期单位", "PeriodSubTimeUnit", Character, 1, 0),
    field("定投期数", "BatchNumOfPeSubs", Numeric, 16, 2),
    field("资金方式", "CapitalMode", Character, 2, 0),
    field("明细资金方式", "DetailCapticalMode", Character, 2, 0),
    field("补差费折扣率", "BackenloadDiscount", Numeric, 5, 4),
    field("组合编号", "CombineNum", Character, 6, 0),
    field("指定认购日期", "FutureSubscribeDate", DigitString, 8, 0),
    field("巨额购买处理标志", "LargeBuyFlag", DigitString, 1, 0),
    field("收费类型", "ChargeType", Character, 1, 0),
    field("指定费率", "SpecifyRateFee", Numeric, 9, 8),
    field("指定费用", "SpecifyFee", Numeric, 16, 2),
    field("过户原因", "TransferReason", Character, 3, 0),
];

////////////////////////////////////////////////////////////////////////////////
// #region Lookup

/// Look up one field by canonical name.
pub fn lookup(canonical_name: &str) -> Result<&'static SpecFieldSpec, OfdError> {
    TUP_OFD_FIELD_SCHEMA
        .iter()
        .find(|spec_field| spec_field.canonical_name == canonical_name)
        .ok_or_else(|| OfdError::FieldNotFound(canonical_name.to_string()))
}

/// Look up one field by its output identifier.
pub fn lookup_by_identifier(identifier: &str) -> Result<&'static SpecFieldSpec, OfdError> {
    TUP_OFD_FIELD_SCHEMA
        .iter()
        .find(|spec_field| spec_field.identifier == identifier)
        .ok_or_else(|| OfdError::FieldNotFound(identifier.to_string()))
}

pub fn contains(canonical_name: &str) -> bool {
    lookup(canonical_name).is_ok()
}

/// Canonical names in table order.
pub fn field_names() -> Vec<&'static str> {
    TUP_OFD_FIELD_SCHEMA
        .iter()
        .map(|spec_field| spec_field.canonical_name)
        .collect()
}

/// Canonical names sorted, for pick lists.
pub fn field_names_sorted() -> Vec<&'static str> {
    let mut l_names = field_names();
    l_names.sort_unstable();
    l_names
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn test_schema_entries_are_well_formed() {
        for spec_field in TUP_OFD_FIELD_SCHEMA {
            assert!(spec_field.byte_length >= 1, "{}", spec_field.canonical_name);
            if spec_field.type_class != Numeric {
                assert_eq!(spec_field.decimal_places, 0, "{}", spec_field.canonical_name);
            }
        }
    }

    #[test]
    fn test_schema_names_and_identifiers_are_unique() {
        let set_names: BTreeSet<_> = TUP_OFD_FIELD_SCHEMA
            .iter()
            .map(|spec_field| spec_field.canonical_name)
            .collect();
        let set_identifiers: BTreeSet<_> = TUP_OFD_FIELD_SCHEMA
            .iter()
            .map(|spec_field| spec_field.identifier)
            .collect();
        assert_eq!(set_names.len(), TUP_OFD_FIELD_SCHEMA.len());
        assert_eq!(set_identifiers.len(), TUP_OFD_FIELD_SCHEMA.len());
    }

    #[test]
    fn test_lookup_known_fields() {
        let spec_fund_code = lookup("基金代码").expect("fund code");
        assert_eq!(spec_fund_code.identifier, "FundCode");
        assert_eq!(spec_fund_code.type_class, Character);
        assert_eq!(spec_fund_code.byte_length, 6);

        let spec_amount = lookup("申请金额").expect("amount");
        assert_eq!(spec_amount.type_class, Numeric);
        assert_eq!((spec_amount.byte_length, spec_amount.decimal_places), (16, 2));

        let spec_date = lookup_by_identifier("TransactionDate").expect("date");
        assert_eq!(spec_date.canonical_name, "交易发生日期");
        assert_eq!(spec_date.type_class, DigitString);
    }

    #[test]
    fn test_lookup_unknown_field_is_not_defaulted() {
        assert_eq!(
            lookup("不存在的字段"),
            Err(OfdError::FieldNotFound("不存在的字段".to_string()))
        );
        assert!(!contains(""));
    }

    #[test]
    fn test_field_names_sorted_is_a_permutation() {
        let l_sorted = field_names_sorted();
        assert_eq!(l_sorted.len(), field_names().len());
        assert!(l_sorted.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
